//! SQLite record of every post the tool has already seen.
//!
//! The record is what lets repeated runs skip work: the synchronizer filters
//! each listing page against it, and the cataloguer filters local files by
//! content hash before asking the remote service about them. It is a plain
//! table keyed by post identifier (see `migrations/`), so a database written
//! by older tooling is adopted without conversion.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::repo::{Batch, Inserted, Repository};
