//! File metadata returned by storage backends.

use std::{ops::Deref, path::PathBuf};

// Typestate: a file is discovered by listing, and only becomes useful to the
// cataloguer once its content hash has been recovered (from the file name or
// from the bytes). Deref to FileMeta for mixed collections.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// File name relative to the target directory
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

mod sealed {
    pub trait Sealed {}
}
pub trait HashState: sealed::Sealed {
    type Hash;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discovered;
impl sealed::Sealed for Discovered {}
impl HashState for Discovered {
    type Hash = ();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hashed;
impl sealed::Sealed for Hashed {}
impl HashState for Hashed {
    type Hash = String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo<S: HashState = Discovered> {
    meta: FileMeta,
    /// Lowercase hex MD5 of the file content.
    pub content_hash: S::Hash,
}
impl<S: HashState> FileInfo<S> {
    pub fn into_meta(self) -> FileMeta {
        self.meta
    }
}
impl<S: HashState> Deref for FileInfo<S> {
    type Target = FileMeta;
    fn deref(&self) -> &FileMeta {
        &self.meta
    }
}

impl FileInfo {
    /// Create a new FileInfo from a listing operation (no hash yet).
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        FileMeta { path: path.into(), size }.into()
    }

    pub fn with_hash(self, hash: impl Into<String>) -> FileInfo<Hashed> {
        FileInfo { meta: self.meta, content_hash: hash.into() }
    }
}
impl From<FileMeta> for FileInfo<Discovered> {
    fn from(meta: FileMeta) -> Self {
        Self { meta, content_hash: () }
    }
}
