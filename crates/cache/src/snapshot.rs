//! On-disk form of a cache: one JSON document per cache.

use crate::CacheEntry;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

/// Bumped whenever the layout changes; older snapshots are discarded.
pub(crate) const FORMAT: u32 = 1;

#[derive(Serialize, Deserialize)]
pub(crate) struct Snapshot<T> {
    pub format: u32,
    pub name: String,
    pub entries: HashMap<String, CacheEntry<T>>,
}

/// Write through a temporary file so a crash mid-write leaves the previous
/// snapshot intact.
pub(crate) async fn write<T: Serialize>(path: &Path, snapshot: &Snapshot<T>) -> Result<()> {
    let bytes = serde_json::to_vec(snapshot).or_raise(|| ErrorKind::Serialize)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Persist(path.to_path_buf()))?;
    }
    let temp = path.with_extension("json.tmp");
    tokio::fs::write(&temp, bytes).await.or_raise(|| ErrorKind::Persist(temp.clone()))?;
    tokio::fs::rename(&temp, path).await.or_raise(|| ErrorKind::Persist(path.to_path_buf()))
}

/// Remove the snapshot file; a file that is already gone is not an error.
pub(crate) async fn delete(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).or_raise(|| ErrorKind::Persist(path.to_path_buf())),
    }
}

pub(crate) enum Loaded<T> {
    Missing,
    /// Unreadable, unparseable, or written by another cache or format.
    Unusable(String),
    Found(HashMap<String, CacheEntry<T>>),
}

pub(crate) async fn read<T: for<'de> Deserialize<'de>>(path: &Path, name: &str) -> Loaded<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == IoErrorKind::NotFound => return Loaded::Missing,
        Err(err) => return Loaded::Unusable(err.to_string()),
    };
    match serde_json::from_slice::<Snapshot<T>>(&bytes) {
        Ok(snapshot) if snapshot.format != FORMAT => Loaded::Unusable(format!("format {}", snapshot.format)),
        Ok(snapshot) if snapshot.name != name => Loaded::Unusable(format!("belongs to cache {:?}", snapshot.name)),
        Ok(snapshot) => Loaded::Found(snapshot.entries),
        Err(err) => Loaded::Unusable(err.to_string()),
    }
}
