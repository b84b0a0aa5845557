use crate::catalogue::error::{ErrorKind, Result};
use crate::catalogue::hash::recover_hashes;
use crate::catalogue::{CatalogueEvent, CatalogueOptions, LOOKUP_BATCH};
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use async_stream::stream;
use booru_api::PostSource;
use booru_api::models::Posts;
use booru_cache::Repository;
use booru_storage::BackendHandle;
use exn::{Exn, ResultExt};
use futures::Stream;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

/// Streams [`CatalogueEvent`]s while recording the posts behind the files in
/// `backend`.
///
/// Files are never modified. Hashes are looked up in batches of
/// [`LOOKUP_BATCH`], and each batch is committed before the next one is
/// sent, so an interrupted run keeps what it already found. A failed lookup
/// ends the stream.
pub fn catalogue<'a>(
    backend: &'a BackendHandle,
    cache: &'a Repository,
    source: &'a dyn PostSource,
    options: CatalogueOptions,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = LibraryResult<CatalogueEvent>> + 'a {
    stream! {
        for await event in catalogue_inner(backend, cache, source, options, cancel) {
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

fn catalogue_inner<'a>(
    backend: &'a BackendHandle,
    cache: &'a Repository,
    source: &'a dyn PostSource,
    options: CatalogueOptions,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<CatalogueEvent>> + 'a {
    stream!({
        yield Ok(CatalogueEvent::Started);

        let mut recovered = match recover_hashes(backend, cancel).await {
            Ok(recovered) => recovered,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let files = recovered.len();
        if options.filter {
            let hashes: Vec<String> = recovered.iter().map(|r| r.file.content_hash.clone()).collect();
            match cache.lookup_ids_by_hash(&hashes).await.or_raise(|| ErrorKind::Cache) {
                Ok(known) => recovered.retain(|r| !known.contains_key(&r.file.content_hash)),
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
        }
        tracing::info!(target = backend.name(), files, pending = recovered.len(), "Cataloguing");
        yield Ok(CatalogueEvent::Hashed { files, pending: recovered.len() });

        let pending: Vec<String> = recovered
            .into_iter()
            .map(|r| r.file.content_hash)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut found = 0;
        for hashes in pending.chunks(LOOKUP_BATCH) {
            let posts = match cancel.run_until_cancelled(source.lookup_by_hash(hashes)).await {
                Some(Ok(posts)) => posts,
                Some(Err(e)) => {
                    yield Err(e).or_raise(|| ErrorKind::Source);
                    return;
                },
                None => {
                    yield Err(Exn::from(ErrorKind::Interrupted));
                    return;
                },
            };
            found += posts.len();
            yield Ok(CatalogueEvent::LookedUp { requested: hashes.len(), found: posts.len() });
            if options.simulate {
                continue;
            }
            match record(cache, &posts).await {
                Ok(inserted) => yield Ok(CatalogueEvent::Committed { inserted }),
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
        }

        yield Ok(CatalogueEvent::Complete { found });
    })
}

async fn record(cache: &Repository, posts: &Posts) -> Result<u64> {
    let mut batch = cache.begin().await.or_raise(|| ErrorKind::Cache)?;
    batch.insert_if_absent(posts.values()).await.or_raise(|| ErrorKind::Cache)?;
    batch.commit().await.or_raise(|| ErrorKind::Cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSource, backend_root, fixture, hash};
    use futures::{StreamExt, TryStreamExt};

    async fn run(
        backend: &BackendHandle,
        cache: &Repository,
        source: &FakeSource,
        options: CatalogueOptions,
    ) -> Vec<CatalogueEvent> {
        let cancel = CancellationToken::new();
        catalogue(backend, cache, source, options, &cancel).try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn test_catalogue_records_found_posts() {
        let (dir, backend, _db, cache) = fixture().await;
        for id in 1..=4 {
            std::fs::write(backend_root(&dir).join(format!("{}.jpg", hash(id))), b"data").unwrap();
        }
        // Unknown to the remote service.
        std::fs::write(backend_root(&dir).join(format!("{}.jpg", hash(99))), b"data").unwrap();
        let source = FakeSource::with_posts(1..=10);
        let events = run(&backend, &cache, &source, CatalogueOptions::default()).await;

        assert_eq!(events, vec![
            CatalogueEvent::Started,
            CatalogueEvent::Hashed { files: 5, pending: 5 },
            CatalogueEvent::LookedUp { requested: 5, found: 4 },
            CatalogueEvent::Committed { inserted: 4 },
            CatalogueEvent::Complete { found: 4 },
        ]);
        assert_eq!(cache.filter_unseen(1..=4).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_known_hashes_are_filtered() {
        let (dir, backend, _db, cache) = fixture().await;
        for id in 1..=3 {
            std::fs::write(backend_root(&dir).join(format!("{}.jpg", hash(id))), b"data").unwrap();
        }
        let source = FakeSource::with_posts(1..=3);
        run(&backend, &cache, &source, CatalogueOptions::default()).await;
        let events = run(&backend, &cache, &source, CatalogueOptions::default()).await;
        assert!(events.contains(&CatalogueEvent::Hashed { files: 3, pending: 0 }));
        assert_eq!(source.lookups().len(), 1);

        // Without filtering, everything is looked up again but nothing new
        // is inserted.
        let unfiltered = CatalogueOptions { filter: false, simulate: false };
        let events = run(&backend, &cache, &source, unfiltered).await;
        assert!(events.contains(&CatalogueEvent::Hashed { files: 3, pending: 3 }));
        assert!(events.contains(&CatalogueEvent::Committed { inserted: 0 }));
    }

    #[tokio::test]
    async fn test_lookups_are_batched() {
        let (dir, backend, _db, cache) = fixture().await;
        for id in 1..=250 {
            std::fs::write(backend_root(&dir).join(format!("{}.png", hash(id))), b"data").unwrap();
        }
        // Same content under another name collapses into one lookup.
        std::fs::write(backend_root(&dir).join(format!("0000001_{}.jpg", hash(1))), b"data").unwrap();
        let source = FakeSource::with_posts(1..=250);
        let events = run(&backend, &cache, &source, CatalogueOptions::default()).await;

        let sizes: Vec<usize> = source.lookups().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert!(events.contains(&CatalogueEvent::Hashed { files: 251, pending: 251 }));
        assert_eq!(events.last(), Some(&CatalogueEvent::Complete { found: 250 }));
    }

    #[tokio::test]
    async fn test_interrupted_before_hashing() {
        let (dir, backend, _db, cache) = fixture().await;
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            std::fs::write(backend_root(&dir).join(name), b"data").unwrap();
        }
        let source = FakeSource::with_posts(1..=3);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events: Vec<_> =
            catalogue(&backend, &cache, &source, CatalogueOptions::default(), &cancel).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().ok(), Some(&CatalogueEvent::Started));
        assert!(matches!(&events[1], Err(e) if **e == LibraryErrorKind::Interrupted));
        assert!(source.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_simulate_records_nothing() {
        let (dir, backend, _db, cache) = fixture().await;
        std::fs::write(backend_root(&dir).join(format!("{}.jpg", hash(1))), b"data").unwrap();
        let source = FakeSource::with_posts(1..=1);
        let options = CatalogueOptions { filter: true, simulate: true };
        let events = run(&backend, &cache, &source, options).await;

        assert!(events.contains(&CatalogueEvent::LookedUp { requested: 1, found: 1 }));
        assert!(!events.iter().any(|e| matches!(e, CatalogueEvent::Committed { .. })));
        assert_eq!(cache.filter_unseen([1]).await.unwrap().len(), 1);
    }
}
