//! HTTP implementation of [`PostSource`].

use crate::error::{ErrorKind, Result};
use crate::models::{Post, Posts};
use crate::parse::parse_posts;
use crate::source::{Content, ListQuery, PostSource};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use reqwest::{Request, Url, header};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const LIST_PATH: &str = "post/index.xml";
const LOOKUP_PATH: &str = "find_posts";

/// Where the API and the file content live, and how to introduce ourselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Root of the API; listing and lookup paths are resolved against it.
    pub base_url: String,
    /// Root that post file names are resolved against for downloads.
    pub content_url: String,
    pub user_agent: String,
}
impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://danbooru.donmai.us/".to_string(),
            content_url: "http://s3.amazonaws.com/danbooru/".to_string(),
            user_agent: concat!("booru/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP client for the image-board API.
///
/// Requests are never retried; a failure is returned to the caller, who
/// decides whether to abort the page or the whole run.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    content_url: Url,
}
impl Client {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&settings.user_agent)
                .or_raise(|| ErrorKind::InvalidSetting(settings.user_agent.clone()))?,
        );
        let http = reqwest::Client::builder().default_headers(headers).build().or_raise(|| ErrorKind::Request)?;
        Ok(Self {
            http,
            base_url: normalize(&settings.base_url)?,
            content_url: normalize(&settings.content_url)?,
        })
    }

    fn list_request(&self, query: &ListQuery) -> Result<Request> {
        let url = self.base_url.join(LIST_PATH).or_raise(|| ErrorKind::InvalidSetting(LIST_PATH.to_string()))?;
        self.http
            .get(url)
            .query(&[
                ("tags", query.expression()),
                ("limit", query.window().to_string()),
                ("offset", query.offset.to_string()),
            ])
            .build()
            .or_raise(|| ErrorKind::Request)
    }

    fn lookup_request(&self, hashes: &[String]) -> Result<Request> {
        let url = self.base_url.join(LOOKUP_PATH).or_raise(|| ErrorKind::InvalidSetting(LOOKUP_PATH.to_string()))?;
        self.http.get(url).query(&[("md5", hashes.join(","))]).build().or_raise(|| ErrorKind::Request)
    }

    fn content_url(&self, post: &Post) -> Result<Url> {
        let name = post.file_name().ok_or_raise(|| ErrorKind::NoFileUrl(post.id))?;
        // Url::join would read a name like `tag:abc.jpg` as an absolute URL.
        let mut url = self.content_url.clone();
        url.path_segments_mut()
            .ok()
            .ok_or_raise(|| ErrorKind::InvalidSetting(self.content_url.to_string()))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    async fn fetch_posts(&self, request: Request) -> Result<Posts> {
        let start = Instant::now();
        let url = request.url().clone();
        let response = self.http.execute(request).await.or_raise(|| ErrorKind::Request)?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        let document = response.text().await.or_raise(|| ErrorKind::Request)?;
        let posts = parse_posts(&document)?;
        tracing::debug!(%url, count = posts.len(), elapsed = ?start.elapsed(), "Fetched posts");
        Ok(posts)
    }
}

#[async_trait]
impl PostSource for Client {
    async fn list_posts(&self, query: &ListQuery) -> Result<Posts> {
        self.fetch_posts(self.list_request(query)?).await
    }

    async fn lookup_by_hash(&self, hashes: &[String]) -> Result<Posts> {
        if hashes.is_empty() {
            return Ok(Posts::new());
        }
        self.fetch_posts(self.lookup_request(hashes)?).await
    }

    async fn fetch_content(&self, post: &Post) -> Result<Content> {
        let url = self.content_url(post)?;
        tracing::debug!(id = post.id, %url, "Requesting file content");
        let response = self.http.get(url).send().await.or_raise(|| ErrorKind::Request)?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        Ok(Content {
            length: response.content_length(),
            body: response.bytes_stream().map(|chunk| chunk.or_raise(|| ErrorKind::Request)).boxed(),
        })
    }
}

/// Parse an endpoint root, making sure it ends with a slash so that
/// [`Url::join`] appends to it instead of replacing the last segment.
fn normalize(raw: &str) -> Result<Url> {
    let mut url = raw.trim().to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    let parsed = Url::parse(&url).or_raise(|| ErrorKind::InvalidSetting(raw.to_string()))?;
    if parsed.cannot_be_a_base() {
        exn::bail!(ErrorKind::InvalidSetting(raw.to_string()));
    }
    Ok(parsed)
}
