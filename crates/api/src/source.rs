//! The post source seam.
//!
//! Everything downstream (synchronizer, cataloguer) talks to a
//! [`PostSource`] rather than to the HTTP [`Client`](crate::Client), so the
//! remote service can be swapped out for a fake in tests.

use crate::error::Result;
use crate::models::{Post, Posts, Rating};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// One paged listing request.
///
/// The request covers the window `[offset, limit)`, so at most
/// `limit - offset` posts are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub tags: Vec<String>,
    pub rating: Option<Rating>,
    /// Only return posts with an identifier strictly greater than this.
    pub after_id: Option<u64>,
    pub limit: u32,
    pub offset: u32,
}
impl ListQuery {
    /// Number of posts the window asks for.
    pub fn window(&self) -> u32 {
        self.limit.saturating_sub(self.offset)
    }

    /// Render the tag expression sent to the server.
    ///
    /// Spaces inside a single tag become underscores; tags are separated by
    /// spaces (which the query encoder turns into `+`). Rating and cursor are
    /// appended as `rating:` and `after_id:` meta-tags.
    pub fn expression(&self) -> String {
        let mut terms: Vec<String> = self
            .tags
            .iter()
            .map(|tag| tag.trim().replace(' ', "_"))
            .filter(|tag| !tag.is_empty())
            .collect();
        if let Some(rating) = self.rating {
            terms.push(format!("rating:{rating}"));
        }
        if let Some(after_id) = self.after_id {
            terms.push(format!("after_id:{after_id}"));
        }
        terms.join(" ")
    }
}

/// A streaming file body.
pub struct Content {
    /// Advertised body length, if the server sent one.
    pub length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

/// Remote source of post metadata and file content.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch one page of posts matching a tag expression.
    async fn list_posts(&self, query: &ListQuery) -> Result<Posts>;

    /// Find the posts whose content hash is one of `hashes`.
    ///
    /// Hashes that the server doesn't know about are simply absent from the
    /// result.
    async fn lookup_by_hash(&self, hashes: &[String]) -> Result<Posts>;

    /// Open the file content of a post for streaming.
    async fn fetch_content(&self, post: &Post) -> Result<Content>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn query(tags: &[&str], rating: Option<Rating>, after_id: Option<u64>) -> ListQuery {
        ListQuery {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            rating,
            after_id,
            limit: 200,
            offset: 100,
        }
    }

    #[rstest]
    #[case(&["negima", "cat ears"], None, None, "negima cat_ears")]
    #[case(&["sawatari izumi"], Some(Rating::Safe), None, "sawatari_izumi rating:safe")]
    #[case(&["gif"], None, Some(1234), "gif after_id:1234")]
    #[case(&["flash", " "], Some(Rating::Explicit), Some(7), "flash rating:explicit after_id:7")]
    #[case(&[], None, None, "")]
    fn test_expression(
        #[case] tags: &[&str],
        #[case] rating: Option<Rating>,
        #[case] after_id: Option<u64>,
        #[case] expected: &str,
    ) {
        assert_eq!(query(tags, rating, after_id).expression(), expected);
    }

    #[test]
    fn test_window() {
        assert_eq!(query(&[], None, None).window(), 100);
        let inverted = ListQuery { limit: 10, offset: 20, ..query(&[], None, None) };
        assert_eq!(inverted.window(), 0);
    }
}
