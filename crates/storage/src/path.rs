//! Path validation.
//!
//! Target directories are flat: every file the tool touches lives directly
//! inside the directory, so every storage path must be a single file name.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path and returns it as a bare file name.
///
/// `./name` is accepted and normalized to `name`. Anything that would leave
/// the target directory or descend into a subdirectory is rejected, as are
/// null bytes (which pass through [`Path::components`] on Unix but truncate
/// C-based syscalls).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use booru_storage::validate_path;
/// assert_eq!(validate_path("./0000042_abc.jpg").unwrap(), Path::new("0000042_abc.jpg"));
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("nested/file.png").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let invalid = || ErrorKind::InvalidPath(path.as_ref().to_path_buf());
    let mut name = None;
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {},
            Component::Normal(s) if name.is_none() => {
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                name = Some(s);
            },
            _ => exn::bail!(invalid()),
        }
    }
    match name {
        Some(name) => Ok(PathBuf::from(name)),
        None => exn::bail!(invalid()),
    }
}
