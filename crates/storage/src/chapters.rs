use crate::BackendHandle;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use fray_compress::Compression;
use fray_extract::models::StoryId;
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Materialized chapters: one directory per story, named by its id, holding
/// one independently compressed file per chapter, named by chapter number.
///
/// `42/3.gz` is chapter 3 of story 42 written with gzip. Chapters written
/// under a previously configured format are still found and read.
#[derive(Clone)]
pub struct ChapterStore {
    backend: BackendHandle,
    compression: Compression,
}

impl ChapterStore {
    pub fn new(backend: BackendHandle, compression: Compression) -> Self {
        Self { backend, compression }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Where chapter `chapter` of story `id` is written.
    pub fn chapter_path(&self, id: StoryId, chapter: u32) -> PathBuf {
        Self::path_for(id, chapter, self.compression)
    }

    fn path_for(id: StoryId, chapter: u32, compression: Compression) -> PathBuf {
        PathBuf::from(id.to_string()).join(format!("{chapter}{}", compression.extension()))
    }

    /// Chapter number of a stored file, if the file name is one.
    fn chapter_number(path: &Path) -> Option<u32> {
        path.file_name()?.to_str()?.split('.').next()?.parse().ok()
    }

    /// Compress `body`, verify it decompresses back to itself, and write it.
    /// Returns the number of bytes written.
    #[instrument(skip(self, body), fields(story = %id, chapter, backend = self.backend.name()))]
    pub async fn write(&self, id: StoryId, chapter: u32, body: &str) -> Result<usize> {
        let compression = self.compression;
        let input = body.as_bytes().to_vec();
        let compressed = tokio::task::spawn_blocking(move || compression.compress_verified(&input))
            .await
            .or_raise(|| ErrorKind::BackendError("compression task failed".to_string()))?
            .map_err(ErrorKind::compression)?;
        let path = self.chapter_path(id, chapter);
        self.backend.write(&path, &compressed).await?;
        // Drop copies of this chapter left behind under another format.
        for other in Compression::ALL.into_iter().filter(|format| *format != compression) {
            let stale = Self::path_for(id, chapter, other);
            if self.backend.exists(&stale).await? {
                self.backend.delete(&stale).await?;
            }
        }
        Ok(compressed.len())
    }

    /// The decompressed text of a chapter, or `None` if it hasn't been
    /// downloaded.
    #[instrument(skip(self), fields(story = %id, chapter))]
    pub async fn read(&self, id: StoryId, chapter: u32) -> Result<Option<String>> {
        let formats = std::iter::once(self.compression)
            .chain(Compression::ALL.into_iter().filter(|format| *format != self.compression));
        for format in formats {
            let path = Self::path_for(id, chapter, format);
            let data = match self.backend.read(&path).await {
                Ok(data) => data,
                Err(err) if matches!(&*err, ErrorKind::NotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            let text = format.decompress(&data).map_err(ErrorKind::compression)?;
            let text = String::from_utf8(text).or_raise(|| ErrorKind::InvalidText(path.clone()))?;
            return Ok(Some(text));
        }
        Ok(None)
    }

    /// Chapter numbers stored for a story, ascending.
    pub async fn chapters(&self, id: StoryId) -> Result<Vec<u32>> {
        let prefix = PathBuf::from(id.to_string());
        let mut chapters = self
            .backend
            .list_stream(Some(&prefix))
            .try_filter_map(|info| async move { Ok(Self::chapter_number(&info.path)) })
            .try_collect::<Vec<_>>()
            .await?;
        chapters.sort_unstable();
        chapters.dedup();
        Ok(chapters)
    }

    /// Delete every chapter of a story. Returns how many files were deleted;
    /// a story with nothing stored is not an error.
    #[instrument(skip(self), fields(story = %id))]
    pub async fn remove_story(&self, id: StoryId) -> Result<usize> {
        self.remove_matching(id, |_| true).await
    }

    /// Delete the chapters numbered above `count`.
    #[instrument(skip(self), fields(story = %id))]
    pub async fn remove_beyond(&self, id: StoryId, count: u32) -> Result<usize> {
        self.remove_matching(id, |chapter| chapter > count).await
    }

    async fn remove_matching(&self, id: StoryId, predicate: impl Fn(u32) -> bool) -> Result<usize> {
        let prefix = PathBuf::from(id.to_string());
        let doomed = self
            .backend
            .list(Some(&prefix))
            .await?
            .into_iter()
            .filter(|info| Self::chapter_number(&info.path).is_some_and(&predicate))
            .collect::<Vec<_>>();
        for info in &doomed {
            self.backend.delete(&info.path).await?;
        }
        if !doomed.is_empty() {
            tracing::debug!(removed = doomed.len(), "removed chapter files");
        }
        Ok(doomed.len())
    }
}

impl std::fmt::Debug for ChapterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterStore")
            .field("backend", &self.backend.name())
            .field("compression", &self.compression)
            .finish()
    }
}
