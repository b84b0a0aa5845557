//! Image-board API access.
//!
//! This crate provides the [`Post`](models::Post) model, the [`PostSource`]
//! seam used by the synchronizer and cataloguer, and [`Client`], the HTTP
//! implementation of that seam. Responses are XML documents whose repeated
//! `<post>` elements carry every field as an attribute; see [`parse_posts`].

mod client;
pub mod error;
pub mod models;
mod parse;
mod source;

pub use crate::client::{ApiSettings, Client};
pub use crate::parse::parse_posts;
pub use crate::source::{Content, ListQuery, PostSource};
