//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use fray_compress::Compression;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Writes under a
/// path registered with [`fail_writes_under`](Self::fail_writes_under), and
/// deletes under one registered with
/// [`fail_deletes_under`](Self::fail_deletes_under), fail with an I/O error.
///
/// ```
/// use fray_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("42/1", b"<p>One</p>")]);
/// assert!(backend.exists(Path::new("42/1")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    storage: RwLock<HashMap<PathBuf, (UtcDateTime, Vec<u8>)>>,
    failing_writes: RwLock<Vec<PathBuf>>,
    failing_deletes: RwLock<Vec<PathBuf>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation; broken test setup should not
    /// produce a passing test.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            storage: RwLock::new(map),
            failing_writes: RwLock::new(Vec::new()),
            failing_deletes: RwLock::new(Vec::new()),
        }
    }

    /// Make every subsequent write to a path under `prefix` fail.
    pub async fn fail_writes_under(&self, prefix: impl Into<PathBuf>) {
        self.failing_writes.write().await.push(prefix.into());
    }

    /// Make every subsequent delete of a path under `prefix` fail.
    pub async fn fail_deletes_under(&self, prefix: impl Into<PathBuf>) {
        self.failing_deletes.write().await.push(prefix.into());
    }

    /// Stop failing writes and deletes.
    pub async fn heal(&self) {
        self.failing_writes.write().await.clear();
        self.failing_deletes.write().await.clear();
    }

    fn device_error() -> exn::Exn<ErrorKind> {
        let err = std::io::Error::new(std::io::ErrorKind::StorageFull, "no space left on mock device");
        exn::Exn::from(ErrorKind::Io(err))
    }

    /// Every stored path, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths = self.storage.read().await.keys().cloned().collect::<Vec<_>>();
        paths.sort();
        paths
    }

    fn file_info(&self, path: &Path, size: u64, inserted: UtcDateTime) -> FileInfo {
        FileInfo::new(path, size, inserted, Compression::from_path(path))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let entries: Vec<(PathBuf, (UtcDateTime, u64))> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, (inserted, data))| (path.clone(), (*inserted, data.len() as u64)))
                    .collect()
            };
            for (path, (inserted, size)) in entries {
                yield Ok(self.file_info(&path, size, inserted));
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let (_inserted, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        if self.failing_writes.read().await.iter().any(|prefix| path.starts_with(prefix)) {
            return Err(Self::device_error());
        }
        self.storage.write().await.insert(path, (UtcDateTime::now(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        if self.failing_deletes.read().await.iter().any(|prefix| path.starts_with(prefix)) {
            return Err(Self::device_error());
        }
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write(Path::new("42/1.gz"), b"hello").await.unwrap();
        assert_eq!(backend.read(Path::new("42/1.gz")).await.unwrap(), b"hello");
        let listed = backend.list(Some(Path::new("42"))).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 5);
        assert_eq!(listed[0].compression, Compression::Gzip);
    }

    #[tokio::test]
    async fn test_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(Path::new("42/1.gz")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = backend.delete(Path::new("42/1.gz")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MockBackend::with_files([
            ("4/1.gz", Vec::from(*b"a")),
            ("42/1.gz", Vec::from(*b"b")),
            ("42/2.gz", Vec::from(*b"c")),
        ]);
        assert_eq!(backend.list(Some(Path::new("42"))).await.unwrap().len(), 2);
        assert_eq!(backend.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let backend = MockBackend::default();
        backend.fail_writes_under("42").await;
        let err = backend.write(Path::new("42/6.gz"), b"x").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        backend.write(Path::new("7/1.gz"), b"x").await.unwrap();
        backend.heal().await;
        backend.write(Path::new("42/6.gz"), b"x").await.unwrap();
        assert_eq!(backend.paths().await, vec![PathBuf::from("42/6.gz"), PathBuf::from("7/1.gz")]);
    }

    #[tokio::test]
    async fn test_failing_deletes() {
        let backend = MockBackend::with_files([("42/6.gz", Vec::from(*b"x"))]);
        backend.fail_deletes_under("42").await;
        let err = backend.delete(Path::new("42/6.gz")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert!(backend.exists(Path::new("42/6.gz")).await.unwrap());
        backend.heal().await;
        backend.delete(Path::new("42/6.gz")).await.unwrap();
        assert!(backend.paths().await.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
