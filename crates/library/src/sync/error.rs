//! Error types for the [`sync`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a sync failure.
///
/// ### Fatal
/// - [`ErrorKind::Source`], [`ErrorKind::Cache`], [`ErrorKind::Interrupted`]
///
/// ### Per post (the run carries on)
/// - [`ErrorKind::Transfer`], [`ErrorKind::Storage`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A listing page could not be fetched or parsed.
    #[display("could not fetch listing page")]
    Source,
    /// The post record could not be read or written.
    #[display("post record unavailable")]
    Cache,
    /// A target directory operation failed.
    #[display("target directory operation failed")]
    Storage,
    /// Downloading the content of one post failed.
    #[display("transfer of post {_0} failed")]
    Transfer(#[error(not(source))] u64),
    #[display("interrupted")]
    Interrupted,
}
