//! In-memory stand-ins shared by the synchronizer and cataloguer tests.

use async_trait::async_trait;
use booru_api::error::{ErrorKind as ApiErrorKind, Result as ApiResult};
use booru_api::models::{Post, Posts};
use booru_api::{Content, ListQuery, PostSource};
use booru_cache::{Database, Repository};
use booru_storage::BackendHandle;
use booru_storage::backend::LocalBackend;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub(crate) fn hash(id: u64) -> String {
    format!("{id:032x}")
}

pub(crate) fn content_of(id: u64) -> Vec<u8> {
    format!("content of post {id}").into_bytes()
}

pub(crate) fn post(id: u64) -> Post {
    let mut extra = BTreeMap::new();
    extra.insert("author".to_string(), "ocean".to_string());
    extra.insert("file_url".to_string(), format!("http://example.com/data/{}.jpg", hash(id)));
    Post { id, md5: hash(id), tags: "negima".to_string(), extra }
}

/// The target directory used by [`fixture`].
pub(crate) fn backend_root(dir: &TempDir) -> PathBuf {
    dir.path().join("negima")
}

/// A fresh target directory and an empty in-memory post record.
pub(crate) async fn fixture() -> (TempDir, BackendHandle, Database, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let backend: BackendHandle = Arc::new(LocalBackend::new("negima", backend_root(&dir)).unwrap());
    let db = Database::connect_in_memory().await.unwrap();
    let cache = Repository::from(&db);
    (dir, backend, db, cache)
}

/// A post source that serves a fixed set of posts and remembers every
/// listing query it was asked.
#[derive(Default)]
pub(crate) struct FakeSource {
    posts: Posts,
    failing: HashSet<u64>,
    stalling: HashSet<u64>,
    queries: Mutex<Vec<ListQuery>>,
    lookups: Mutex<Vec<Vec<String>>>,
}
impl FakeSource {
    pub(crate) fn with_posts(ids: impl IntoIterator<Item = u64>) -> Self {
        Self { posts: ids.into_iter().map(|id| (id, post(id))).collect(), ..Self::default() }
    }

    /// The transfer of this post breaks after the first chunk.
    pub(crate) fn fail_transfer(&mut self, id: u64) {
        self.failing.insert(id);
    }

    /// The transfer of this post hangs after the first chunk.
    pub(crate) fn stall_transfer(&mut self, id: u64) {
        self.stalling.insert(id);
    }

    pub(crate) fn drop_file_url(&mut self, id: u64) {
        if let Some(post) = self.posts.get_mut(&id) {
            post.extra.remove("file_url");
        }
    }

    pub(crate) fn queries(&self) -> Vec<ListQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn lookups(&self) -> Vec<Vec<String>> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostSource for FakeSource {
    async fn list_posts(&self, query: &ListQuery) -> ApiResult<Posts> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self
            .posts
            .iter()
            .filter(|(id, _)| query.after_id.is_none_or(|after| **id > after))
            .skip(query.offset as usize)
            .take(query.window() as usize)
            .map(|(id, post)| (*id, post.clone()))
            .collect())
    }

    async fn lookup_by_hash(&self, hashes: &[String]) -> ApiResult<Posts> {
        self.lookups.lock().unwrap().push(hashes.to_vec());
        Ok(self
            .posts
            .iter()
            .filter(|(_, post)| hashes.contains(&post.md5))
            .map(|(id, post)| (*id, post.clone()))
            .collect())
    }

    async fn fetch_content(&self, post: &Post) -> ApiResult<Content> {
        let data = content_of(post.id);
        let (head, tail) = data.split_at(data.len() / 2);
        let head = stream::iter([Ok(Bytes::copy_from_slice(head))]);
        let body = if self.failing.contains(&post.id) {
            head.chain(stream::iter([Err(exn::Exn::from(ApiErrorKind::Request))])).boxed()
        } else if self.stalling.contains(&post.id) {
            head.chain(stream::pending()).boxed()
        } else {
            head.chain(stream::iter([Ok(Bytes::copy_from_slice(tail))])).boxed()
        };
        Ok(Content { length: Some(data.len() as u64), body })
    }
}
