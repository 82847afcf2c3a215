//! Path validation.
//!
//! Every path handed to a backend is relative to the backend root and must
//! never leave it.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Normalize a relative storage path, rejecting anything that would escape
/// the storage root.
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use fray_storage::validate_path;
/// assert!(validate_path("42/3.gz").is_ok());
/// assert!(validate_path("42/../43/1.gz").is_ok()); // (never leaves root)
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("42/../../b").is_err());
/// assert!(validate_path("4\02").is_err());
/// assert_eq!(validate_path("./42//3.gz/").unwrap(), Path::new("42/3.gz"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let invalid = || ErrorKind::InvalidPath(path.as_ref().to_path_buf());
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but
                // truncate in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}
