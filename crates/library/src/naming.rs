//! File naming conventions.
//!
//! Downloads are saved as `{id:07}_{remote file name}`. The remote file name
//! is normally the content hash plus extension, which makes the saved name
//! canonical: `{id:07}_{hash}{ext}`. Identifiers longer than seven digits
//! are written out in full.

use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// First hash in a file stem, optionally behind an identifier prefix.
regex!(HASH_IN_STEM, r"(?:\d+_)?([a-f\d]{32})");
// Identifier prefix of a canonical stem.
regex!(CANONICAL_STEM, r"^(\d+)_[a-f\d]{32}");

/// Split a file name into stem and extension (including the dot).
///
/// Leading dots don't start an extension, so `.hidden` has none.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if name[..index].chars().any(|c| c != '.') => name.split_at(index),
        _ => (name, ""),
    }
}

/// Recover a content hash from a file name without touching its content.
pub fn hash_from_name(name: &str) -> Option<&str> {
    let (stem, _) = split_name(name);
    HASH_IN_STEM.captures(stem).and_then(|captures| captures.get(1)).map(|hash| hash.as_str())
}

/// The post identifier encoded in a canonical file name, if any.
pub fn id_from_name(name: &str) -> Option<u64> {
    let (stem, _) = split_name(name);
    CANONICAL_STEM.captures(stem)?.get(1)?.as_str().parse().ok()
}

/// Local name for a freshly downloaded post.
pub fn download_name(id: u64, file_name: &str) -> String {
    format!("{id:07}_{file_name}")
}

/// Canonical name for a catalogued file. `ext` includes its leading dot.
pub fn canonical_name(id: u64, hash: &str, ext: &str) -> String {
    format!("{id:07}_{hash}{ext}")
}
