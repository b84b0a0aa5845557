use crate::catalogue::error::{ErrorKind, Result};
use crate::naming::hash_from_name;
use booru_storage::BackendHandle;
use booru_storage::file::{FileInfo, Hashed};
use exn::ResultExt;
use futures::TryStreamExt;
use md5::{Digest, Md5};
use tokio_util::sync::CancellationToken;

/// Where a recovered content hash came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSource {
    /// Read off the file name; the content was never opened.
    FileName,
    /// Computed from the file content.
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub file: FileInfo<Hashed>,
    pub source: HashSource,
}

/// Recover the content hash of every file directly inside `backend`.
///
/// A hash embedded in the file name is trusted as-is. Otherwise the file is
/// read and its MD5 digest computed. Files that can't be read (or whose names
/// aren't valid UTF-8) are logged and left out. Results are ordered by file
/// name.
///
/// `cancel` is checked before every file; once it fires the whole recovery
/// fails with [`Interrupted`](ErrorKind::Interrupted).
pub async fn recover_hashes(backend: &BackendHandle, cancel: &CancellationToken) -> Result<Vec<Recovered>> {
    let mut files: Vec<FileInfo> = backend.list_stream().try_collect().await.or_raise(|| ErrorKind::Storage)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    let mut recovered = Vec::with_capacity(files.len());
    for file in files {
        if cancel.is_cancelled() {
            exn::bail!(ErrorKind::Interrupted);
        }
        let Some(name) = file.path.to_str() else {
            tracing::warn!(path = %file.path.display(), "Skipping file with a non UTF-8 name");
            continue;
        };
        if let Some(hash) = hash_from_name(name) {
            let hash = hash.to_string();
            recovered.push(Recovered { file: file.with_hash(hash), source: HashSource::FileName });
            continue;
        }
        match cancel.run_until_cancelled(backend.read(&file.path)).await {
            Some(Ok(bytes)) => {
                let hash = hex::encode(Md5::digest(&bytes));
                recovered.push(Recovered { file: file.with_hash(hash), source: HashSource::Content });
            },
            Some(Err(e)) => tracing::warn!(path = %file.path.display(), error = ?e, "Skipping unreadable file"),
            None => exn::bail!(ErrorKind::Interrupted),
        }
    }
    tracing::debug!(target = backend.name(), files = recovered.len(), "Recovered content hashes");
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{backend_root, fixture};

    #[tokio::test]
    async fn test_hash_from_name_or_content() {
        let (dir, backend, _db, _cache) = fixture().await;
        let root = backend_root(&dir);
        // The name claims a hash that doesn't match the content: the name wins,
        // which proves the content was never read.
        let named = "0000042_0123456789abcdef0123456789abcdef.jpg";
        std::fs::write(root.join(named), b"anything").unwrap();
        std::fs::write(root.join("holiday.jpg"), b"hello world").unwrap();
        std::fs::create_dir(root.join("nested")).unwrap();

        let recovered = recover_hashes(&backend, &CancellationToken::new()).await.unwrap();
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered[0].file.path.to_str(), Some(named));
        assert_eq!(recovered[0].file.content_hash, "0123456789abcdef0123456789abcdef");
        assert_eq!(recovered[0].source, HashSource::FileName);
        assert_eq!(recovered[1].file.path.to_str(), Some("holiday.jpg"));
        assert_eq!(recovered[1].file.content_hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(recovered[1].source, HashSource::Content);
    }

    #[tokio::test]
    async fn test_cancelled_before_reading() {
        let (dir, backend, _db, _cache) = fixture().await;
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            std::fs::write(backend_root(&dir).join(name), b"data").unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = recover_hashes(&backend, &cancel).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Interrupted));
    }
}
