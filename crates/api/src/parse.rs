//! Response document parsing.
//!
//! Both API endpoints answer with a flat document of repeated elements whose
//! attributes carry the record's fields:
//!
//! ```xml
//! <posts count="2" offset="0">
//!   <post id="12" md5="..." tags="..." file_url="..." author="..."/>
//!   <post id="13" md5="..." tags="..." file_url="..." author="..."/>
//! </posts>
//! ```

use crate::error::{ErrorKind, Result};
use crate::models::{Post, Posts};
use exn::ResultExt;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;

const POST_ELEMENT: &[u8] = b"post";

/// Parse every `<post>` element of a response document into [`Posts`].
///
/// Elements with any other name are ignored. A later duplicate identifier
/// replaces an earlier one.
pub fn parse_posts(document: &str) -> Result<Posts> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);
    let mut posts = Posts::new();
    loop {
        match reader.read_event().or_raise(|| ErrorKind::Parse)? {
            Event::Start(element) | Event::Empty(element) if element.name().as_ref() == POST_ELEMENT => {
                let post = Post::from_attributes(attributes(&element)?)?;
                posts.insert(post.id, post);
            },
            Event::Eof => break,
            _ => {},
        }
    }
    tracing::trace!(count = posts.len(), "Parsed posts from response document");
    Ok(posts)
}

fn attributes(element: &BytesStart<'_>) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for attribute in element.attributes() {
        let attribute = attribute.or_raise(|| ErrorKind::Parse)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().or_raise(|| ErrorKind::Parse)?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <posts count="2" offset="0">
          <post id="13" md5="0123456789abcdef0123456789abcdef" tags="negima cat_ears" author="a &amp; b" file_url="http://example.com/data/0123456789abcdef0123456789abcdef.jpg"/>
          <post id="12" md5="FEDCBA9876543210FEDCBA9876543210" tags="negima" rating="s"></post>
        </posts>"#;

    #[test]
    fn test_parse_posts() {
        let posts = parse_posts(DOCUMENT).unwrap();
        assert_eq!(posts.len(), 2);
        // Ordered by identifier regardless of document order.
        assert_eq!(posts.keys().copied().collect::<Vec<_>>(), vec![12, 13]);
        let post = &posts[&13];
        assert_eq!(post.md5, "0123456789abcdef0123456789abcdef");
        assert_eq!(post.tags, "negima cat_ears");
        assert_eq!(post.extra.get("author").map(String::as_str), Some("a & b"));
        assert_eq!(post.file_name(), Some("0123456789abcdef0123456789abcdef.jpg"));
        assert_eq!(posts[&12].md5, "fedcba9876543210fedcba9876543210");
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse_posts(r#"<posts count="0" offset="0"></posts>"#).unwrap().is_empty());
        assert!(parse_posts("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ignores_other_elements() {
        let posts = parse_posts(r#"<response><server id="1" host="a"/><post id="5" md5="abc"/></response>"#).unwrap();
        assert_eq!(posts.keys().copied().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_parse_invalid_id() {
        let err = parse_posts(r#"<posts><post id="five" md5="abc"/></posts>"#).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidAttribute { field: "id", .. }));
    }

    #[test]
    fn test_parse_malformed_document() {
        let err = parse_posts(r#"<posts><post id="1" md5="abc></posts>"#).unwrap_err();
        assert_eq!(*err, ErrorKind::Parse);
    }
}
