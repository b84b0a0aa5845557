use crate::sync::SyncEvent;
use crate::sync::error::{ErrorKind, Result};
use async_stream::stream;
use booru_api::PostSource;
use booru_api::models::Post;
use booru_storage::BackendHandle;
use booru_storage::error::ErrorKind as StorageErrorKind;
use exn::{Exn, ResultExt};
use futures::{Stream, StreamExt};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// A file being written can't always be removed straight away (another
/// process may still hold it open), so removal of a partial download is
/// attempted this many times.
const PARTIAL_DELETE_ATTEMPTS: u32 = 5;
const PARTIAL_DELETE_DELAY: Duration = Duration::from_millis(100);

/// Stream the content of one post into a new file called `name`.
///
/// Yields [`TransferStarted`](SyncEvent::TransferStarted), a
/// [`TransferProgress`](SyncEvent::TransferProgress) per chunk written, then
/// [`Downloaded`](SyncEvent::Downloaded). On any failure, cancellation
/// included, the partial file is removed and a single error is yielded
/// instead of `Downloaded`.
pub(crate) fn transfer<'a>(
    backend: &'a BackendHandle,
    source: &'a dyn PostSource,
    post: &'a Post,
    name: &'a Path,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<SyncEvent>> + 'a {
    stream!({
        let id = post.id;
        let content = match cancel.run_until_cancelled(source.fetch_content(post)).await {
            Some(Ok(content)) => content,
            Some(Err(e)) => {
                yield Err(e).or_raise(|| ErrorKind::Transfer(id));
                return;
            },
            None => {
                yield Err(Exn::from(ErrorKind::Interrupted));
                return;
            },
        };
        let mut writer = match backend.create(name).await {
            Ok(writer) => writer,
            Err(e) => {
                yield Err(e).or_raise(|| ErrorKind::Storage);
                return;
            },
        };
        yield Ok(SyncEvent::TransferStarted { id, name: name.to_path_buf(), length: content.length });

        let mut body = content.body;
        let mut bytes = 0u64;
        let failure = loop {
            let chunk = match cancel.run_until_cancelled(body.next()).await {
                Some(Some(Ok(chunk))) => chunk,
                Some(Some(Err(e))) => break Some(e.raise(ErrorKind::Transfer(id))),
                Some(None) => break None,
                None => break Some(Exn::from(ErrorKind::Interrupted)),
            };
            if let Err(e) = writer.write_all(&chunk).await.or_raise(|| ErrorKind::Transfer(id)) {
                break Some(e);
            }
            bytes += chunk.len() as u64;
            yield Ok(SyncEvent::TransferProgress { id, bytes });
        };
        // Flush before the writer goes away so that late write errors still
        // count as a failed transfer.
        let failure = match failure {
            None => writer.shutdown().await.or_raise(|| ErrorKind::Transfer(id)).err(),
            failure => failure,
        };
        drop(writer);

        if let Some(failure) = failure {
            remove_partial(backend, name).await;
            yield Err(failure);
            return;
        }
        tracing::debug!(id, name = %name.display(), bytes, "Downloaded post");
        yield Ok(SyncEvent::Downloaded { id, name: name.to_path_buf(), bytes });
    })
}

/// Remove a partially written file, retrying a few times before giving up.
async fn remove_partial(backend: &BackendHandle, name: &Path) {
    for attempt in 1..=PARTIAL_DELETE_ATTEMPTS {
        match backend.delete(name).await {
            Ok(()) => return,
            Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => return,
            Err(e) => {
                tracing::debug!(attempt, name = %name.display(), error = ?e, "Could not remove partial download");
                tokio::time::sleep(PARTIAL_DELETE_DELAY).await;
            },
        }
    }
    tracing::warn!(name = %name.display(), "Giving up on removing partial download");
}
