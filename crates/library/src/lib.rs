//! Synchronizer and cataloguer.
//!
//! Both operations work on one target directory (a
//! [`BackendHandle`](booru_storage::BackendHandle)) at a time and report
//! their progress as a stream of events. Per-item failures are yielded as
//! `Err` items and the stream carries on; anything that makes the rest of
//! the operation pointless ends the stream after its error.

pub mod catalogue;
pub mod error;
pub mod naming;
pub mod sync;
#[cfg(test)]
mod testing;

pub use crate::catalogue::{CatalogueEvent, CatalogueOptions, FixEvent, FixOptions, catalogue, fix_names};
pub use crate::sync::{SyncEvent, SyncOptions, sync};
