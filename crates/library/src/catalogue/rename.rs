use crate::catalogue::error::{ErrorKind, Result};
use crate::catalogue::hash::{Recovered, recover_hashes};
use crate::catalogue::{Action, FixEvent, FixOptions};
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::naming::{canonical_name, split_name};
use async_stream::stream;
use booru_cache::Repository;
use booru_storage::BackendHandle;
use exn::{Exn, ResultExt};
use futures::Stream;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Streams [`FixEvent`]s while renaming every file in `backend` that belongs
/// to a recorded post to its canonical name.
///
/// When the canonical name is already taken, the file being renamed is a
/// duplicate and is removed instead; nothing is ever overwritten. Files the
/// post record doesn't know about are left alone. A failed rename or removal
/// is yielded as an `Err` item and the remaining files are still processed.
/// Cancelling `cancel` stops before the next file is touched and ends the
/// stream with [`Interrupted`](LibraryErrorKind::Interrupted).
pub fn fix_names<'a>(
    backend: &'a BackendHandle,
    cache: &'a Repository,
    options: FixOptions,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = LibraryResult<FixEvent>> + 'a {
    stream! {
        for await event in fix_names_inner(backend, cache, options, cancel) {
            yield event.map_err(|e| {
                let kind = match &*e {
                    ErrorKind::Interrupted => LibraryErrorKind::Interrupted,
                    _ => LibraryErrorKind::Catalogue,
                };
                e.raise(kind)
            });
        }
    }
}

fn fix_names_inner<'a>(
    backend: &'a BackendHandle,
    cache: &'a Repository,
    options: FixOptions,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<FixEvent>> + 'a {
    stream!({
        yield Ok(FixEvent::Started);

        let recovered = match recover_hashes(backend, cancel).await {
            Ok(recovered) => recovered,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let hashes: Vec<String> = recovered
            .iter()
            .map(|r| r.file.content_hash.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let ids = match cache.lookup_ids_by_hash(&hashes).await.or_raise(|| ErrorKind::Cache) {
            Ok(ids) => ids,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let matched = recovered.iter().filter(|r| ids.contains_key(&r.file.content_hash)).count();
        yield Ok(FixEvent::Hashed { files: recovered.len(), matched });

        for Recovered { file, .. } in recovered {
            let Some(&id) = ids.get(&file.content_hash) else {
                continue;
            };
            if cancel.is_cancelled() {
                yield Err(Exn::from(ErrorKind::Interrupted));
                return;
            }
            let to = canonical_for(&file.path, id, &file.content_hash);
            yield fix_name(backend, options, file.into_meta().path, to).await.map(FixEvent::Fixed);
        }

        yield Ok(FixEvent::Complete);
    })
}

fn canonical_for(path: &Path, id: u64, hash: &str) -> PathBuf {
    let (_, ext) = split_name(path.to_str().unwrap_or_default());
    PathBuf::from(canonical_name(id, hash, ext))
}

async fn fix_name(backend: &BackendHandle, options: FixOptions, from: PathBuf, to: PathBuf) -> Result<Action> {
    if to == from {
        return Ok(Action::AlreadyCanonical(from));
    }
    let taken = backend.exists(&to).await.or_raise(|| ErrorKind::Rename(from.clone()))?;
    if taken {
        if !options.simulate {
            backend.delete(&from).await.or_raise(|| ErrorKind::Rename(from.clone()))?;
        }
        tracing::debug!(from = %from.display(), to = %to.display(), "Removed duplicate");
        return Ok(Action::RemovedDuplicate { from, to });
    }
    if !options.simulate {
        backend.rename(&from, &to).await.or_raise(|| ErrorKind::Rename(from.clone()))?;
    }
    tracing::debug!(from = %from.display(), to = %to.display(), "Renamed");
    Ok(Action::Renamed { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{backend_root, fixture, hash, post};
    use booru_api::models::Post;
    use futures::{StreamExt, TryStreamExt};

    async fn record(cache: &Repository, ids: impl IntoIterator<Item = u64>) {
        let posts: Vec<_> = ids.into_iter().map(post).collect();
        let mut batch = cache.begin().await.unwrap();
        batch.insert_if_absent(&posts).await.unwrap();
        batch.commit().await.unwrap();
    }

    async fn fix(backend: &BackendHandle, cache: &Repository, options: FixOptions) -> Vec<FixEvent> {
        let cancel = CancellationToken::new();
        fix_names(backend, cache, options, &cancel).try_collect().await.unwrap()
    }

    fn fixed(events: Vec<FixEvent>) -> Vec<Action> {
        events
            .into_iter()
            .filter_map(|event| match event {
                FixEvent::Fixed(action) => Some(action),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_rename_to_canonical() {
        let (dir, backend, _db, cache) = fixture().await;
        record(&cache, [42]).await;
        std::fs::write(backend_root(&dir).join(format!("{}.JPG", hash(42))), b"data").unwrap();
        std::fs::write(backend_root(&dir).join("unknown.png"), b"who knows").unwrap();

        let events = fix(&backend, &cache, FixOptions::default()).await;
        assert!(events.contains(&FixEvent::Hashed { files: 2, matched: 1 }));
        let canonical = PathBuf::from(format!("0000042_{}.JPG", hash(42)));
        assert_eq!(fixed(events), vec![Action::Renamed {
            from: PathBuf::from(format!("{}.JPG", hash(42))),
            to: canonical.clone(),
        }]);
        assert_eq!(backend.read(&canonical).await.unwrap(), b"data");
        assert!(backend.exists(Path::new("unknown.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_collision_removes_duplicate() {
        let (dir, backend, _db, cache) = fixture().await;
        record(&cache, [7]).await;
        let canonical = format!("0000007_{}.jpg", hash(7));
        let duplicate = format!("wallpaper_{}.jpg", hash(7));
        std::fs::write(backend_root(&dir).join(&canonical), b"original").unwrap();
        std::fs::write(backend_root(&dir).join(&duplicate), b"copy").unwrap();

        let events = fix(&backend, &cache, FixOptions::default()).await;
        let actions = fixed(events);
        assert!(actions.contains(&Action::AlreadyCanonical(PathBuf::from(&canonical))));
        assert!(actions.contains(&Action::RemovedDuplicate {
            from: PathBuf::from(&duplicate),
            to: PathBuf::from(&canonical),
        }));
        assert!(!backend.exists(Path::new(&duplicate)).await.unwrap());
        assert_eq!(backend.read(Path::new(&canonical)).await.unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_collision_by_content_hash() {
        let (dir, backend, _db, cache) = fixture().await;
        let content_hash = "5eb63bbbe01eeed093cb22bb8f5acdc3";
        let recorded = Post { id: 9, md5: content_hash.to_string(), ..post(9) };
        let mut batch = cache.begin().await.unwrap();
        batch.insert_if_absent([&recorded]).await.unwrap();
        batch.commit().await.unwrap();
        let canonical = format!("0000009_{content_hash}.png");
        std::fs::write(backend_root(&dir).join("old.png"), b"hello world").unwrap();
        std::fs::write(backend_root(&dir).join(&canonical), b"hello world").unwrap();

        let events = fix(&backend, &cache, FixOptions::default()).await;
        assert!(fixed(events).contains(&Action::RemovedDuplicate {
            from: PathBuf::from("old.png"),
            to: PathBuf::from(&canonical),
        }));
        assert!(!backend.exists(Path::new("old.png")).await.unwrap());
        assert!(backend.exists(Path::new(&canonical)).await.unwrap());
    }

    #[tokio::test]
    async fn test_simulate_leaves_files_alone() {
        let (dir, backend, _db, cache) = fixture().await;
        record(&cache, [3]).await;
        let original = format!("{}.gif", hash(3));
        std::fs::write(backend_root(&dir).join(&original), b"data").unwrap();

        let options = FixOptions { simulate: true };
        let events = fix(&backend, &cache, options).await;
        assert_eq!(fixed(events).len(), 1);
        assert!(backend.exists(Path::new(&original)).await.unwrap());
        assert!(!backend.exists(Path::new(&format!("0000003_{}.gif", hash(3)))).await.unwrap());
    }

    #[tokio::test]
    async fn test_interrupted_renames_nothing() {
        let (dir, backend, _db, cache) = fixture().await;
        record(&cache, [1, 2]).await;
        for id in [1, 2] {
            std::fs::write(backend_root(&dir).join(format!("{}.jpg", hash(id))), b"data").unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events: Vec<_> = fix_names(&backend, &cache, FixOptions::default(), &cancel).collect().await;

        let last = events.last().unwrap();
        assert!(matches!(last, Err(e) if **e == LibraryErrorKind::Interrupted));
        assert!(!events.iter().any(|e| matches!(e, Ok(FixEvent::Fixed(_)) | Ok(FixEvent::Complete))));
        for id in [1, 2] {
            assert!(backend.exists(Path::new(&format!("{}.jpg", hash(id)))).await.unwrap());
        }
    }
}
