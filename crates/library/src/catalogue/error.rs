//! Error types for the [`catalogue`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A catalogue error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalogue operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a catalogue failure.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The remote hash lookup failed.
    #[display("hash lookup failed")]
    Source,
    /// The post record could not be read or written.
    #[display("post record unavailable")]
    Cache,
    /// The directory could not be listed.
    #[display("directory listing failed")]
    Storage,
    /// Renaming or removing one file failed.
    #[display("could not fix name of {}", _0.display())]
    Rename(#[error(not(source))] PathBuf),
    #[display("interrupted")]
    Interrupted,
}
