use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::naming::download_name;
use crate::sync::cursor::highest_id;
use crate::sync::error::{ErrorKind, Result};
use crate::sync::transfer::transfer;
use crate::sync::{SkipReason, SyncEvent, SyncOptions, Termination, Window};
use async_stream::stream;
use booru_api::models::{Post, Posts};
use booru_api::{ListQuery, PostSource};
use booru_cache::Repository;
use booru_storage::BackendHandle;
use exn::{Exn, ResultExt};
use futures::Stream;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Where the run is between two events.
enum State {
    Paging { offset: u32 },
    Filtering { window: Window, returned: usize, posts: Posts },
    Downloading { window: Window, returned: usize, posts: Posts },
    Committing { window: Window, returned: usize, accepted: Vec<Post> },
    Advancing { window: Window, returned: usize },
    Done(Termination),
}

/// Streams [`SyncEvent`]s while downloading every post matching
/// `options.tags` into `backend`.
///
/// The run moves through `PAGING → FILTERING → DOWNLOADING → COMMITTING`
/// once per page of [`PAGE_SIZE`](super::PAGE_SIZE) posts, until the server
/// runs out of posts or `options.limit` is reached. Unless
/// `options.refresh` is set, only posts newer than the highest identifier
/// already saved in `backend` are requested.
///
/// A post whose transfer fails is yielded as an `Err` item, left out of the
/// post record (so a later run tries again) and the run moves on. Failing to
/// fetch a page or to use the post record ends the stream. Cancelling
/// `cancel` ends the stream with [`Interrupted`](LibraryErrorKind::Interrupted)
/// after any partial file has been removed.
pub fn sync<'a>(
    backend: &'a BackendHandle,
    cache: &'a Repository,
    source: &'a dyn PostSource,
    options: &'a SyncOptions,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = LibraryResult<SyncEvent>> + 'a {
    stream! {
        for await event in sync_inner(backend, cache, source, options, cancel) {
            yield event.map_err(|e| {
                let kind = match &*e {
                    ErrorKind::Interrupted => LibraryErrorKind::Interrupted,
                    _ => LibraryErrorKind::Sync,
                };
                e.raise(kind)
            });
        }
    }
}

fn sync_inner<'a>(
    backend: &'a BackendHandle,
    cache: &'a Repository,
    source: &'a dyn PostSource,
    options: &'a SyncOptions,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<SyncEvent>> + 'a {
    stream!({
        let cursor = if options.refresh {
            None
        } else {
            match backend.list().await.or_raise(|| ErrorKind::Storage) {
                Ok(files) => highest_id(&files),
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
        };
        tracing::info!(target = backend.name(), ?cursor, "Synchronizing");
        yield Ok(SyncEvent::Started { cursor });

        let mut state = State::Paging { offset: options.offset };
        loop {
            state = match state {
                State::Paging { offset } => {
                    if cancel.is_cancelled() {
                        yield Err(Exn::from(ErrorKind::Interrupted));
                        return;
                    }
                    let Some(window) = Window::starting_at(offset, options.limit) else {
                        state = State::Done(Termination::CeilingReached);
                        continue;
                    };
                    let query = ListQuery {
                        tags: options.tags.clone(),
                        rating: options.rating,
                        after_id: cursor,
                        limit: window.end,
                        offset: window.start,
                    };
                    let posts = match cancel.run_until_cancelled(source.list_posts(&query)).await {
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
                    let returned = posts.len();
                    yield Ok(SyncEvent::PageFetched { offset: window.start, returned });
                    State::Filtering { window, returned, posts }
                },
                State::Filtering { window, returned, mut posts } => {
                    if options.check_duplicates {
                        match cache.filter_unseen(posts.keys().copied()).await.or_raise(|| ErrorKind::Cache) {
                            Ok(unseen) => posts.retain(|id, _| unseen.contains(id)),
                            Err(e) => {
                                yield Err(e);
                                return;
                            },
                        }
                        yield Ok(SyncEvent::PageFiltered { returned, unseen: posts.len() });
                    }
                    State::Downloading { window, returned, posts }
                },
                State::Downloading { window, returned, posts } if options.simulate => {
                    tracing::debug!(posts = posts.len(), "Simulating; not downloading");
                    State::Advancing { window, returned }
                },
                State::Downloading { window, returned, posts } => {
                    let mut accepted = Vec::with_capacity(posts.len());
                    for (id, post) in posts {
                        let Some(file_name) = post.file_name() else {
                            yield Ok(SyncEvent::Skipped { id, reason: SkipReason::NoFileUrl });
                            continue;
                        };
                        let name = PathBuf::from(download_name(id, file_name));
                        match backend.exists(&name).await.or_raise(|| ErrorKind::Storage) {
                            // Already downloaded by an earlier run that never
                            // got to record it.
                            Ok(true) => {
                                yield Ok(SyncEvent::Skipped { id, reason: SkipReason::AlreadyExists });
                                accepted.push(post);
                                continue;
                            },
                            Ok(false) => {},
                            Err(e) => {
                                yield Err(e);
                                continue;
                            },
                        }
                        let mut downloaded = false;
                        for await event in transfer(backend, source, &post, &name, cancel) {
                            match event {
                                Ok(event) => {
                                    downloaded |= matches!(event, SyncEvent::Downloaded { .. });
                                    yield Ok(event);
                                },
                                Err(e) if matches!(&*e, ErrorKind::Interrupted) => {
                                    yield Err(e);
                                    return;
                                },
                                Err(e) => yield Err(e),
                            }
                        }
                        if downloaded {
                            accepted.push(post);
                        }
                    }
                    State::Committing { window, returned, accepted }
                },
                State::Committing { window, returned, accepted } => {
                    if options.check_duplicates {
                        match record(cache, &accepted).await {
                            Ok(inserted) => yield Ok(SyncEvent::Committed { inserted }),
                            Err(e) => {
                                yield Err(e);
                                return;
                            },
                        }
                    }
                    State::Advancing { window, returned }
                },
                State::Advancing { window, returned } => {
                    // Compared against the posts the page asked for, not the
                    // ones left after filtering.
                    if returned < window.len() as usize {
                        State::Done(Termination::Exhausted { returned })
                    } else {
                        State::Paging { offset: window.end }
                    }
                },
                State::Done(termination) => {
                    match backend.prune().await.or_raise(|| ErrorKind::Storage) {
                        Ok(true) => {
                            tracing::info!(target = backend.name(), "Removed empty target directory");
                            yield Ok(SyncEvent::Pruned);
                        },
                        Ok(false) => {},
                        Err(e) => yield Err(e),
                    }
                    yield Ok(SyncEvent::Finished(termination));
                    return;
                },
            };
        }
    })
}

async fn record(cache: &Repository, posts: &[Post]) -> Result<u64> {
    let mut batch = cache.begin().await.or_raise(|| ErrorKind::Cache)?;
    batch.insert_if_absent(posts).await.or_raise(|| ErrorKind::Cache)?;
    batch.commit().await.or_raise(|| ErrorKind::Cache)
}
