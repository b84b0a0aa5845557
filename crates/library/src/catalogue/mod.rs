//! Cataloguing of existing file collections.
//!
//! Two operations work on a directory that was filled by hand, or by other
//! tools, rather than by [`sync`](crate::sync):
//!
//! - [`catalogue`] looks every file up on the remote service by content hash
//!   and records the posts it finds, so that later synchronizer runs skip
//!   them.
//! - [`fix_names`] renames files the post record knows about to their
//!   canonical `{id:07}_{hash}{ext}` name.
//!
//! Both start by recovering a content hash per file (see
//! [`recover_hashes`]).

pub(crate) mod error;
mod hash;
mod record;
mod rename;

pub use self::hash::{HashSource, Recovered, recover_hashes};
pub use self::record::catalogue;
pub use self::rename::fix_names;
use std::path::PathBuf;

/// Maximum number of hashes sent in one remote lookup.
pub const LOOKUP_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogueOptions {
    /// Skip files whose hash the post record already knows.
    pub filter: bool,
    /// Look hashes up, but record nothing.
    pub simulate: bool,
}
impl Default for CatalogueOptions {
    fn default() -> Self {
        Self { filter: true, simulate: false }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixOptions {
    /// Report what would be renamed or removed without touching any file.
    pub simulate: bool,
}

/// Progress events emitted by [`catalogue`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Hashed`](Self::Hashed), exactly once.
/// 3. Per lookup batch: [`LookedUp`](Self::LookedUp), then
///    [`Committed`](Self::Committed) unless simulating.
/// 4. [`Complete`](Self::Complete), exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogueEvent {
    Started,
    /// Hashes were recovered for `files` files; `pending` of them are not in
    /// the post record yet.
    Hashed { files: usize, pending: usize },
    LookedUp { requested: usize, found: usize },
    Committed { inserted: u64 },
    Complete { found: usize },
}

/// The outcome of fixing the name of a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The file already has its canonical name.
    AlreadyCanonical(PathBuf),
    /// A file with the canonical name already exists; this copy was removed.
    RemovedDuplicate { from: PathBuf, to: PathBuf },
    Renamed { from: PathBuf, to: PathBuf },
}

/// Progress events emitted by [`fix_names`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixEvent {
    Started,
    /// Hashes were recovered for `files` files; `matched` of them belong to a
    /// recorded post.
    Hashed { files: usize, matched: usize },
    Fixed(Action),
    Complete,
}
