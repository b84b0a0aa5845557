//! Tag synchronization.
//!
//! Pages through the posts matching a tag expression, drops the ones the
//! post record already knows about, downloads the rest into a target
//! directory and records them. See [`sync`] for the order of events.

mod cursor;
pub(crate) mod error;
mod stream;
mod transfer;

pub use self::stream::sync;
use booru_api::models::Rating;
use std::path::PathBuf;

/// Number of posts requested per listing page.
pub const PAGE_SIZE: u32 = 100;

/// Settings for one synchronizer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub tags: Vec<String>,
    pub rating: Option<Rating>,
    /// Absolute position (in results) at which paging stops.
    pub limit: u32,
    /// Absolute position (in results) at which paging starts.
    pub offset: u32,
    /// Ignore the cursor and page through every result.
    pub refresh: bool,
    /// Filter pages against the post record and record what was downloaded.
    pub check_duplicates: bool,
    /// Fetch and filter pages, but neither download nor record anything.
    pub simulate: bool,
}

/// The `[start, end)` slice of results requested by one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u32,
    pub end: u32,
}
impl Window {
    /// The page starting at `offset`, or `None` once the ceiling is reached.
    pub fn starting_at(offset: u32, limit: u32) -> Option<Self> {
        (offset < limit).then(|| Self { start: offset, end: offset.saturating_add(PAGE_SIZE).min(limit) })
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Why a run stopped paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The server returned fewer posts than the page asked for.
    Exhausted { returned: usize },
    /// Paging reached the configured limit.
    CeilingReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The post doesn't advertise a file to download.
    NoFileUrl,
    /// A file with the local name is already in the target directory.
    AlreadyExists,
}

/// Progress events emitted by [`sync`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. Per page: [`PageFetched`](Self::PageFetched), then
///    [`PageFiltered`](Self::PageFiltered) unless duplicate checking is off,
///    then the transfer events for each post in identifier order, then
///    [`Committed`](Self::Committed) unless simulating or not checking
///    duplicates.
/// 3. [`Pruned`](Self::Pruned) if the target directory was empty and removed.
/// 4. [`Finished`](Self::Finished), exactly once.
///
/// A fatal error (or an interrupt) ends the stream early, in which case
/// [`Finished`](Self::Finished) is never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started { cursor: Option<u64> },
    PageFetched { offset: u32, returned: usize },
    PageFiltered { returned: usize, unseen: usize },
    TransferStarted { id: u64, name: PathBuf, length: Option<u64> },
    /// Cumulative bytes written for the post being transferred.
    TransferProgress { id: u64, bytes: u64 },
    Downloaded { id: u64, name: PathBuf, bytes: u64 },
    Skipped { id: u64, reason: SkipReason },
    Committed { inserted: u64 },
    Pruned,
    Finished(Termination),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1000, Some((0, 100)))]
    #[case(900, 1000, Some((900, 1000)))]
    #[case(950, 1000, Some((950, 1000)))]
    #[case(0, 37, Some((0, 37)))]
    #[case(1000, 1000, None)]
    #[case(1200, 1000, None)]
    #[case(u32::MAX - 10, u32::MAX, Some((u32::MAX - 10, u32::MAX)))]
    fn test_window(#[case] offset: u32, #[case] limit: u32, #[case] expected: Option<(u32, u32)>) {
        let window = Window::starting_at(offset, limit);
        assert_eq!(window.map(|w| (w.start, w.end)), expected);
    }
}
