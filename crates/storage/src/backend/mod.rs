//! Storage backend trait and implementations.
//!
//! A backend represents a single target directory: the download destination
//! of a synchronizer run, or one directory being catalogued. Backends are
//! flat; listing does not descend into subdirectories and every path is a
//! bare file name (see [`validate_path`](crate::validate_path)).

mod local;

pub use self::local::LocalBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncWrite;

type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
pub type BoxAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;

/// Unified interface for target directory operations.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use booru_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_download(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("0000042_0123456789abcdef0123456789abcdef.jpg");
///     if backend.exists(path).await? {
///         Ok(backend.read(path).await?.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Human-readable name of the target (used for logging only).
    fn name(&self) -> &str;

    /// List all regular files directly inside the target.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self) -> Result<Vec<FileInfo>> {
        self.list_stream().try_collect().await
    }

    /// Stream metadata for every regular file directly inside the target.
    ///
    /// Subdirectories, broken symlinks and other special entries are
    /// skipped. A target that does not exist lists as empty.
    fn list_stream(&self) -> FileInfoStream<'_>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create a new file for streaming writes.
    ///
    /// Returns [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists)
    /// instead of truncating an existing file. Callers should `flush()` (or
    /// `shutdown()`) before dropping the writer so that write errors are
    /// observed.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use tokio::io::AsyncWriteExt;
    /// # use booru_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> std::io::Result<()> {
    /// let mut writer = backend.create(Path::new("0000001_file.png")).await.unwrap();
    /// writer.write_all(b"\x89PNG...").await?;
    /// writer.shutdown().await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn create(&self, path: &Path) -> Result<BoxAsyncWrite>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Rename a file within the target.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist and
    /// [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists) instead of
    /// replacing an existing destination.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove the target itself if it contains no entries at all.
    ///
    /// Returns `true` if the target was removed.
    async fn prune(&self) -> Result<bool>;
}
