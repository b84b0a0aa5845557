//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Each operation module has its own
//! error kinds; they are raised into one of these at the public stream
//! boundary.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("synchronization failed")]
    Sync,
    #[display("cataloguing failed")]
    Catalogue,
    /// The user asked the operation to stop. Partial files have already been
    /// cleaned up; the caller should report and exit.
    #[display("interrupted")]
    Interrupted,
}
