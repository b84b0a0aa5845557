use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::collections::BTreeMap;

/// Posts keyed (and therefore ordered) by their identifier.
pub type Posts = BTreeMap<u64, Post>;

/// A single remote content record.
///
/// The identifier, content hash and tag string are typed fields; every other
/// attribute the server sends (author, rating, dimensions, `file_url`, ...)
/// is kept verbatim in [`extra`](Self::extra). The cache stores `extra` as an
/// opaque blob and never interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    /// Lowercase, 32-hex-digit MD5 of the file content.
    pub md5: String,
    /// Space-separated tag string.
    pub tags: String,
    pub extra: BTreeMap<String, String>,
}
impl Post {
    /// Build a post from the raw attribute set of a `<post>` element.
    ///
    /// `id`, `md5` and `tags` are removed from the set; whatever is left
    /// becomes [`extra`](Self::extra).
    pub fn from_attributes(mut attributes: BTreeMap<String, String>) -> Result<Self> {
        let id = attributes.remove("id").ok_or_raise(|| ErrorKind::MissingAttribute("id"))?;
        let id = id.trim().parse::<u64>().or_raise(|| ErrorKind::InvalidAttribute {
            field: "id",
            value: id.clone(),
        })?;
        let md5 = attributes.remove("md5").ok_or_raise(|| ErrorKind::MissingAttribute("md5"))?.to_lowercase();
        let tags = attributes.remove("tags").unwrap_or_default();
        Ok(Self { id, md5, tags, extra: attributes })
    }

    pub fn file_url(&self) -> Option<&str> {
        self.extra.get("file_url").map(String::as_str)
    }

    /// The trailing path segment of the post's file URL (`abc123.jpg` for
    /// `http://host/data/abc123.jpg`), ignoring any query string.
    pub fn file_name(&self) -> Option<&str> {
        let url = self.file_url()?;
        let url = url.split(['?', '#']).next().unwrap_or(url);
        match url.rsplit_once('/') {
            Some((_, name)) if !name.is_empty() => Some(name),
            Some(_) => None,
            None if !url.is_empty() => Some(url),
            None => None,
        }
    }
}
