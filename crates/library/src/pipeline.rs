//! Fetching stories and turning them into chapter files on disk.

use crate::context::Context;
use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::{OptionExt, ResultExt};
use fray_cache::ExpiringCache;
use fray_events::ChangeEvent;
use fray_extract::models::{Canon, ListingPage, Review, StoryId, StoryListing, StoryModel, StoryProgress, StoryStatus};
use fray_extract::{ChapterPage, StoryPage};
use fray_store::Column;
use futures::{Stream, StreamExt};
use std::ops::RangeInclusive;
use std::pin::pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    /// Serve from the page cache when possible.
    Cached,
    /// Always ask the remote, then refresh the cache.
    Fresh,
}

/// One chapter body, as extracted from its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedChapter {
    pub number: u32,
    pub body: String,
}

/// Outcome of draining the download queue.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueReport {
    pub downloaded: Vec<StoryId>,
    /// Gone from the remote, and so dropped from the queue.
    pub not_found: Vec<StoryId>,
    /// Still queued.
    pub failed: Vec<StoryId>,
    pub cancelled: bool,
}

/// Acquires stories: metadata into the store, chapters onto disk.
///
/// Cheap to clone; every clone works with the same [`Context`].
#[derive(Debug, Clone)]
pub struct ChapterPipeline {
    ctx: Context,
}

impl ChapterPipeline {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Metadata of a story, from its first chapter page. `None` if the remote
    /// says the story does not exist.
    #[instrument(skip(self, cancel), fields(%id))]
    pub async fn fetch_story_model(&self, id: StoryId, cancel: &CancellationToken) -> Result<Option<StoryModel>> {
        Ok(self.first_page(id, Freshness::Cached, cancel).await?.map(|page| page.model))
    }

    /// Stream the bodies of chapters `from..=to` of `model`, in order.
    ///
    /// Fetching runs ahead of the consumer by at most the context's channel
    /// capacity. Dropping the stream stops the fetching. The stream ends after
    /// the first error.
    pub fn fetch_chapter_range(
        &self,
        model: &StoryModel,
        from: u32,
        to: u32,
        cancel: &CancellationToken,
    ) -> impl Stream<Item = Result<FetchedChapter>> + Send + 'static {
        let chapters = from.max(1)..=to.min(model.fragment.chapters);
        self.chapter_stream(model.id, chapters, model.fragment.chapters, Freshness::Cached, None, cancel)
    }

    /// Fetch a story and write every chapter to disk.
    ///
    /// The story is stored as [`Remote`](StoryStatus::Remote) (or left as it
    /// was, if further along) before any chapter is fetched, and only marked
    /// [`Local`](StoryStatus::Local) once all of them are written. A story
    /// that was already downloaded is put back as it was if the chapters
    /// cannot all be written. Returns `None` if the remote says the story does
    /// not exist.
    #[instrument(skip(self, cancel), fields(%id))]
    pub async fn fetch_and_materialize(&self, id: StoryId, cancel: &CancellationToken) -> Result<Option<StoryModel>> {
        let result = self.download(id, cancel).await;
        match &result {
            Ok(Some(story)) => self.ctx.progress.download_complete(story),
            Ok(None) => self.ctx.progress.story_not_found(id),
            Err(err) => self.ctx.progress.download_failed(id, err),
        }
        result
    }

    async fn download(&self, id: StoryId, cancel: &CancellationToken) -> Result<Option<StoryModel>> {
        let Some(ChapterPage { mut model, body }) = self.first_page(id, Freshness::Cached, cancel).await? else {
            return Ok(None);
        };
        let previous = self.ctx.store.query_by_id(id).await.or_raise(|| ErrorKind::Store)?;
        model.status = StoryStatus::Remote;
        let stored = self.ctx.store.upsert_merged(model).await.or_raise(|| ErrorKind::Store)?;
        let total = stored.fragment.chapters;

        let first = FetchedChapter { number: 1, body };
        let chapters = self.chapter_stream(id, 1..=total, total, Freshness::Cached, Some(first), cancel);
        if let Err(err) = self.materialize(id, total, chapters).await {
            // The merge kept `Local`, which the new chapter count no longer backs.
            if let Some(previous) = previous.filter(|story| story.status == StoryStatus::Local) {
                self.roll_back(&previous).await;
            }
            return Err(err);
        }
        self.remove_surplus(id, total).await;

        if stored.status == StoryStatus::Local {
            return Ok(Some(stored));
        }
        let story = self
            .ctx
            .store
            .update_columns(id, &[Column::Status(StoryStatus::Local)])
            .await
            .or_raise(|| ErrorKind::Store)?;
        Ok(Some(story))
    }

    /// Bring a downloaded story up to date with the remote.
    ///
    /// Returns `None` when there is nothing to do: the remote reports the same
    /// update time as `old`, reports none at all, or no longer has the story.
    /// Only new trailing chapters are fetched when the story grew; a story
    /// that shrank is fetched in full and its surplus chapter files removed.
    /// If the chapters cannot be written the stored story is put back to
    /// `old`, keeping any reading progress recorded in the meantime.
    #[instrument(skip_all, fields(id = %old.id))]
    pub async fn reconcile(&self, old: &StoryModel, cancel: &CancellationToken) -> Result<Option<StoryModel>> {
        let id = old.id;
        if old.status != StoryStatus::Local {
            exn::bail!(ErrorKind::NotMaterialized(id));
        }
        let Some(ChapterPage { model: mut new, body }) = self.first_page(id, Freshness::Fresh, cancel).await? else {
            tracing::warn!("story no longer exists on the remote");
            return Ok(None);
        };
        match (old.fragment.updated, new.fragment.updated) {
            (Some(_), None) => exn::bail!(ErrorKind::Inconsistent(id)),
            (_, None) => return Ok(None),
            (before, after) if before == after => return Ok(None),
            _ => {},
        }

        let before = old.fragment.chapters;
        let after = new.fragment.chapters;
        new.status = StoryStatus::Local;
        let stored = self.ctx.store.upsert_merged(new).await.or_raise(|| ErrorKind::Store)?;
        tracing::info!(before, after, "story updated on the remote");

        let range = if after == 1 {
            1..=1
        } else if after > before {
            before + 1..=after
        } else {
            1..=after
        };
        let first = (*range.start() == 1).then(|| FetchedChapter { number: 1, body });
        let chapters = self.chapter_stream(id, range.clone(), after, Freshness::Fresh, first, cancel);
        let expected = range.end() + 1 - range.start();
        if let Err(err) = self.materialize(id, expected, chapters).await {
            self.roll_back(old).await;
            self.ctx.progress.download_failed(id, &err);
            return Err(err);
        }
        if after < before {
            self.remove_surplus(id, after).await;
        }
        self.ctx.progress.download_complete(&stored);
        Ok(Some(stored))
    }

    /// Restore the metadata and status of `old` after a failed update, along
    /// with its chapter files. The store republishes the story as changed, so
    /// observers drop whatever they were shown of the update.
    async fn roll_back(&self, old: &StoryModel) {
        match self.ctx.store.restore(old).await {
            Ok(Some(_)) => tracing::warn!(id = %old.id, "update rolled back"),
            Ok(None) => tracing::warn!(id = %old.id, "story removed during the update, nothing to roll back"),
            Err(err) => tracing::error!(id = %old.id, error = ?err, "could not roll back update"),
        }
        self.remove_surplus(old.id, old.fragment.chapters).await;
    }

    /// Delete chapter files numbered above `total`. Failures are logged only.
    async fn remove_surplus(&self, id: StoryId, total: u32) {
        match self.ctx.chapters.remove_beyond(id, total).await {
            Ok(0) => {},
            Ok(removed) => tracing::debug!(removed, "removed chapters past the end of the story"),
            Err(err) => tracing::warn!(%id, error = ?err, "could not remove chapters past the end of the story"),
        }
    }

    /// Forget a story entirely: its row, queue entry, marker and chapter
    /// files. Publishes [`Removed`](fray_events::ChangeKind::Removed) with the
    /// last stored model, if there was one.
    #[instrument(skip(self), fields(%id))]
    pub async fn remove(&self, id: StoryId) -> Result<Option<StoryModel>> {
        let store = &self.ctx.store;
        let removed = store.delete(id).await.or_raise(|| ErrorKind::Store)?;
        store.dequeue(id).await.or_raise(|| ErrorKind::Store)?;
        store.clear_marker(id).await.or_raise(|| ErrorKind::Store)?;
        let files = self.ctx.chapters.remove_story(id).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(files, "removed chapter files");
        if let Some(story) = &removed {
            store.bus().publish(ChangeEvent::removed(story.clone()));
        }
        Ok(removed)
    }

    /// Download every queued story, front to back.
    ///
    /// Downloaded and not-found stories leave the queue; failed ones stay for
    /// the next run. Cancellation abandons the story in progress and stops.
    #[instrument(skip_all)]
    pub async fn process_queue(&self, cancel: &CancellationToken) -> Result<QueueReport> {
        let mut report = QueueReport::default();
        for id in self.ctx.store.queue().await.or_raise(|| ErrorKind::Store)? {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.fetch_and_materialize(id, cancel).await {
                Ok(found) => {
                    self.ctx.store.dequeue(id).await.or_raise(|| ErrorKind::Store)?;
                    match found {
                        Some(_) => report.downloaded.push(id),
                        None => report.not_found.push(id),
                    }
                },
                Err(err) if *err == ErrorKind::Cancelled => {
                    report.cancelled = true;
                    break;
                },
                Err(err) => {
                    tracing::warn!(%id, error = ?err, "download failed, leaving story queued");
                    report.failed.push(id);
                },
            }
        }
        Ok(report)
    }

    /// Record the reading position in a stored story and stamp it as read
    /// now.
    #[instrument(skip(self))]
    pub async fn record_progress(
        &self,
        id: StoryId,
        chapter: u32,
        scroll_progress: f64,
        scroll_absolute: f64,
    ) -> Result<StoryModel> {
        let story = self
            .ctx
            .store
            .query_by_id(id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .ok_or_raise(|| ErrorKind::UnknownStory(id))?;
        let progress = StoryProgress::new(chapter, scroll_progress, scroll_absolute);
        if !progress.is_valid_for(story.fragment.chapters) {
            exn::bail!(ErrorKind::InvalidProgress(id));
        }
        let mut columns = Column::progress(progress).to_vec();
        columns.push(Column::LastRead(Some(fray_extract::models::now())));
        self.ctx.store.update_columns(id, &columns).await.or_raise(|| ErrorKind::Store)
    }

    /// A materialized chapter, or `None` if it has not been downloaded.
    pub async fn read_chapter(&self, id: StoryId, chapter: u32) -> Result<Option<String>> {
        self.ctx.chapters.read(id, chapter).await.or_raise(|| ErrorKind::Storage)
    }

    #[instrument(skip(self, cancel))]
    pub async fn fetch_canon_page(&self, path: &str, page: u32, cancel: &CancellationToken) -> Result<StoryListing> {
        let url = self.ctx.site.canon(path, page)?;
        let key = format!("{path}-{page}");
        let html = self.fetch_page(&url, key, &self.ctx.listings, Freshness::Cached, cancel).await?;
        fray_extract::parse_canon_page(&html).or_raise(|| ErrorKind::Parse)
    }

    #[instrument(skip(self, cancel))]
    pub async fn fetch_categories(&self, path: &str, cancel: &CancellationToken) -> Result<Vec<Canon>> {
        let url = self.ctx.site.category(path)?;
        let html = self.fetch_page(&url, path.to_string(), &self.ctx.listings, Freshness::Cached, cancel).await?;
        fray_extract::parse_categories(&html).or_raise(|| ErrorKind::Parse)
    }

    /// Reviews of `chapter`, or of every chapter when it is 0.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_reviews(
        &self,
        id: StoryId,
        chapter: u32,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<ListingPage<Review>> {
        let url = self.ctx.site.reviews(id, chapter, page)?;
        let key = format!("{id}-{chapter}-{page}");
        let html = self.fetch_page(&url, key, &self.ctx.listings, Freshness::Cached, cancel).await?;
        fray_extract::parse_reviews(&html).or_raise(|| ErrorKind::Parse)
    }

    async fn first_page(
        &self,
        id: StoryId,
        freshness: Freshness,
        cancel: &CancellationToken,
    ) -> Result<Option<ChapterPage>> {
        let html = self.story_page(id, 1, freshness, cancel).await?;
        match fray_extract::parse_story_page(&html).or_raise(|| ErrorKind::Parse)? {
            StoryPage::NotFound => Ok(None),
            StoryPage::Found(page) => Ok(Some(page)),
        }
    }

    async fn story_page(
        &self,
        id: StoryId,
        chapter: u32,
        freshness: Freshness,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let url = self.ctx.site.story(id, chapter)?;
        self.fetch_page(&url, format!("{id}-{chapter}"), &self.ctx.pages, freshness, cancel).await
    }

    async fn fetch_chapter(
        &self,
        id: StoryId,
        chapter: u32,
        freshness: Freshness,
        cancel: &CancellationToken,
    ) -> Result<FetchedChapter> {
        let html = self.story_page(id, chapter, freshness, cancel).await?;
        let body = fray_extract::parse_chapter(&html)
            .or_raise(|| ErrorKind::Parse)?
            .ok_or_raise(|| ErrorKind::MissingChapter { id, chapter })?;
        Ok(FetchedChapter { number: chapter, body })
    }

    async fn fetch_page(
        &self,
        url: &Url,
        key: String,
        cache: &ExpiringCache<String>,
        freshness: Freshness,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if freshness == Freshness::Cached
            && let Some(page) = cache.hit(&key).await
        {
            tracing::trace!(%url, "page served from cache");
            return Ok(page);
        }
        let page = self.ctx.fetcher.fetch(url, cancel).await.map_err(ErrorKind::fetch)?;
        // The page is in memory either way; only the snapshot is behind.
        if let Err(err) = cache.update(key, page.clone()).await {
            tracing::warn!(cache = cache.name(), error = ?err, "could not persist page cache");
        }
        Ok(page)
    }

    /// Fetch `chapters` on a separate task, handing them over through a
    /// bounded channel. `first` is used instead of fetching when its chapter
    /// comes up.
    fn chapter_stream(
        &self,
        id: StoryId,
        chapters: RangeInclusive<u32>,
        total: u32,
        freshness: Freshness,
        first: Option<FetchedChapter>,
        cancel: &CancellationToken,
    ) -> impl Stream<Item = Result<FetchedChapter>> + Send + 'static {
        let (tx, mut rx) = mpsc::channel(self.ctx.channel_capacity.max(1));
        let cancel = cancel.child_token();
        let producer = cancel.clone();
        let pipeline = self.clone();
        tokio::spawn(async move {
            let mut first = first;
            for chapter in chapters {
                let fetched = match first.take_if(|known| known.number == chapter) {
                    Some(known) => Ok(known),
                    None => pipeline.fetch_chapter(id, chapter, freshness, &producer).await,
                };
                let failed = fetched.is_err();
                if !failed {
                    pipeline.ctx.progress.chapter_fetched(id, chapter, total);
                }
                if tx.send(fetched).await.is_err() || failed {
                    break;
                }
            }
        });
        // Dropping the stream cancels whatever the producer is waiting on.
        let guard = cancel.drop_guard();
        stream! {
            let _guard = guard;
            while let Some(chapter) = rx.recv().await {
                yield chapter;
            }
        }
    }

    /// Write every chapter from the stream, failing if fewer than `expected`
    /// arrive.
    async fn materialize<S>(&self, id: StoryId, expected: u32, chapters: S) -> Result<()>
    where
        S: Stream<Item = Result<FetchedChapter>>,
    {
        let mut chapters = pin!(chapters);
        let mut written = 0;
        while let Some(chapter) = chapters.next().await {
            let chapter = chapter?;
            self.ctx
                .chapters
                .write(id, chapter.number, &chapter.body)
                .await
                .or_raise(|| ErrorKind::Storage)?;
            written += 1;
        }
        if written != expected {
            tracing::error!(written, expected, "chapter stream ended early");
            exn::bail!(ErrorKind::Fetch);
        }
        tracing::debug!(written, "chapters written");
        Ok(())
    }
}
