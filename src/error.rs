//! Error kinds reported by the command line driver.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("post record unavailable")]
    Database,
    #[display("remote service client could not be created")]
    Client,
    #[display("target directory unusable")]
    Storage,
    /// At least one operation reported an error; the run went on regardless.
    #[display("finished with errors")]
    Incomplete,
    #[display("interrupted")]
    Interrupted,
}

impl ErrorKind {
    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Interrupted => 130,
            _ => 1,
        }
    }
}
