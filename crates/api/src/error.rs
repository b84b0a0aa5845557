//! API Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An API error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configured endpoint or header value is unusable.
    #[display("invalid api setting: {_0}")]
    InvalidSetting(#[error(not(source))] String),
    /// The request could not be sent, or the response body could not be read.
    #[display("request failed")]
    Request,
    /// The server answered with a non-success status code.
    #[display("server responded with status {_0}")]
    Status(#[error(not(source))] u16),
    /// The response document is not well-formed XML.
    #[display("malformed response document")]
    Parse,
    /// A post element is missing a required attribute.
    #[display("post is missing required attribute: {_0}")]
    MissingAttribute(#[error(not(source))] &'static str),
    /// A post attribute was found but could not be parsed.
    #[display("failed to parse attribute '{field}', found value: {value}")]
    InvalidAttribute {
        /// The attribute that failed to parse.
        field: &'static str,
        /// The offending value.
        value: String,
    },
    /// The post has no file URL to download content from.
    #[display("post {_0} has no file url")]
    NoFileUrl(#[error(not(source))] u64),
}
