//! Local filesystem storage backend.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use fray_compress::Compression;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Stores files in a directory on the local filesystem. All paths are
/// relative to the configured root directory.
///
/// ```no_run
/// use fray_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("chapters", "/var/lib/fray/chapters")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Create a backend rooted at `root`, which must be absolute. The
    /// directory is created if it does not exist yet.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        Ok(validate_path(relative)?)
    }

    fn metadata(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = UtcDateTime::from(metadata.modified().map_err(ErrorKind::Io)?);
        let compression = Compression::from_path(path);
        Ok(FileInfo::new(path, metadata.len(), modified, compression))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    // Errors can't be `?`-ed inside the stream loop, so everything fallible
    // about a single entry lives here.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        let relative = self.relative_path(&path)?;
        if metadata.is_dir() {
            // Descend into directories on the way to the prefix, too.
            if let Some(pfx) = prefix
                && !relative.starts_with(pfx)
                && !pfx.starts_with(&relative)
            {
                return Ok(WalkEntry::Skip);
            }
            return Ok(WalkEntry::Descend(path));
        }
        if let Some(pfx) = prefix
            && !relative.starts_with(pfx)
        {
            return Ok(WalkEntry::Skip);
        }
        if metadata.is_file() {
            return Ok(WalkEntry::File(Self::metadata(&relative, metadata)?));
        }
        // Most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        // Start from the prefix's parent: the prefix itself may be a file or
        // may not exist yet.
        let start_dir = validated_prefix
            .as_ref()
            .map(|prefix| self.root.join(prefix).parent().unwrap_or(&self.root).to_path_buf())
            .unwrap_or_else(|| self.root.clone());
        let mut stack = vec![start_dir];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A directory that doesn't exist lists as empty.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        // Drop the story directory once its last chapter is gone.
        if let Some(parent) = abs_path.parent()
            && parent != self.root
        {
            let _ = fs::remove_dir(parent).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("chapters", temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("chapters", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("chapters", "relative/path").is_err());
        assert!(LocalBackend::new("chapters", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("library/chapters");
        LocalBackend::new("chapters", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_path_mapping() {
        let (temp_dir, backend) = backend();
        let expected = temp_dir.path().join("42/3.gz");
        assert_eq!(backend.absolute_path("42/3.gz").unwrap(), expected);
        assert_eq!(backend.relative_path(&expected).unwrap(), Path::new("42/3.gz"));
        assert!(backend.absolute_path("../etc/passwd").is_err());
        assert!(backend.relative_path("/elsewhere/3.gz").is_err());
    }

    #[tokio::test]
    async fn test_write_read_list() {
        let (_temp_dir, backend) = backend();
        backend.write(Path::new("42/1.gz"), b"chapter").await.unwrap();
        assert_eq!(backend.read(Path::new("42/1.gz")).await.unwrap(), b"chapter");
        let listed = backend.list(Some(Path::new("42"))).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, Path::new("42/1.gz"));
        assert_eq!(listed[0].size, 7);
        assert_eq!(listed[0].compression, Compression::Gzip);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let (_temp_dir, backend) = backend();
        let err = backend.read(Path::new("42/1.gz")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_prefix_is_component_based() {
        let (_temp_dir, backend) = backend();
        backend.write(Path::new("4/1.gz"), b"a").await.unwrap();
        backend.write(Path::new("42/1.gz"), b"b").await.unwrap();
        backend.write(Path::new("42/2.gz"), b"c").await.unwrap();
        let mut paths = backend
            .list(Some(Path::new("42")))
            .await
            .unwrap()
            .into_iter()
            .map(|info| info.path)
            .collect::<Vec<_>>();
        paths.sort();
        assert_eq!(paths, vec![PathBuf::from("42/1.gz"), PathBuf::from("42/2.gz")]);
        assert_eq!(backend.list(None).await.unwrap().len(), 3);
        assert!(backend.list(Some(Path::new("7"))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_empty_story_directory() {
        let (temp_dir, backend) = backend();
        backend.write(Path::new("42/1.gz"), b"a").await.unwrap();
        backend.write(Path::new("42/2.gz"), b"b").await.unwrap();
        backend.delete(Path::new("42/1.gz")).await.unwrap();
        assert!(temp_dir.path().join("42").is_dir());
        backend.delete(Path::new("42/2.gz")).await.unwrap();
        assert!(!temp_dir.path().join("42").exists());
        let err = backend.delete(Path::new("42/2.gz")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_path_security() {
        let (_temp_dir, backend) = backend();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data").await.is_err());
        assert!(backend.delete(Path::new("42/../../file")).await.is_err());
    }
}
