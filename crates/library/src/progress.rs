//! The user-visible side of acquisition.
//!
//! [`Progress`] receives per-story events from the pipeline, alongside the
//! fetcher's [`Signals`]. [`ChannelNotifier`] implements both and forwards
//! everything to a single consumer task, so whatever displays notifications
//! only ever runs in one place.

use crate::error::Error;
use derive_more::Display;
use fray_extract::models::{StoryId, StoryModel};
use fray_fetch::Signals;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Implementations must return quickly; they are called inline from the
/// pipeline.
pub trait Progress: Send + Sync {
    /// Chapter `chapter` of `total` has been fetched and is on its way to disk.
    fn chapter_fetched(&self, id: StoryId, chapter: u32, total: u32);
    fn download_complete(&self, story: &StoryModel);
    fn story_not_found(&self, id: StoryId);
    fn download_failed(&self, id: StoryId, error: &Error);
}

/// Logs progress and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl Progress for TracingProgress {
    fn chapter_fetched(&self, id: StoryId, chapter: u32, total: u32) {
        tracing::debug!(%id, chapter, total, "chapter fetched");
    }

    fn download_complete(&self, story: &StoryModel) {
        tracing::info!(id = %story.id, title = %story.title, "download complete");
    }

    fn story_not_found(&self, id: StoryId) {
        tracing::warn!(%id, "story not found");
    }

    fn download_failed(&self, id: StoryId, error: &Error) {
        tracing::error!(%id, error = ?error, "download failed");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Notification {
    #[display("waiting for network")]
    WaitingForNetwork,
    #[display("network restored")]
    NetworkRestored,
    #[display("fetching {url} failed ({reason}), retrying")]
    FetchFailed { url: Url, reason: String },
    #[display("fetching {url} recovered")]
    FetchRecovered { url: Url },
    #[display("story {id}: chapter {chapter}/{total}")]
    ChapterFetched { id: StoryId, chapter: u32, total: u32 },
    #[display("story {id} downloaded: {title}")]
    DownloadComplete { id: StoryId, title: String },
    #[display("story {id} not found")]
    NotFound { id: StoryId },
    #[display("story {id} failed: {reason}")]
    DownloadFailed { id: StoryId, reason: String },
}

/// Sends every signal and progress event down one channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hand each notification to `handler` on a dedicated task. The task ends
    /// once every clone of the notifier has been dropped.
    pub fn spawn<F>(mut handler: F) -> (Self, JoinHandle<()>)
    where
        F: FnMut(Notification) + Send + 'static,
    {
        let (notifier, mut rx) = Self::channel();
        let task = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                handler(notification);
            }
        });
        (notifier, task)
    }

    fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("notification consumer is gone");
        }
    }
}

impl Signals for ChannelNotifier {
    fn waiting_for_network(&self) {
        self.send(Notification::WaitingForNetwork);
    }

    fn network_restored(&self) {
        self.send(Notification::NetworkRestored);
    }

    fn fetch_failed(&self, url: &Url, error: &fray_fetch::error::Error) {
        let reason = (**error).to_string();
        self.send(Notification::FetchFailed { url: url.clone(), reason });
    }

    fn fetch_recovered(&self, url: &Url) {
        self.send(Notification::FetchRecovered { url: url.clone() });
    }
}

impl Progress for ChannelNotifier {
    fn chapter_fetched(&self, id: StoryId, chapter: u32, total: u32) {
        self.send(Notification::ChapterFetched { id, chapter, total });
    }

    fn download_complete(&self, story: &StoryModel) {
        self.send(Notification::DownloadComplete { id: story.id, title: story.title.clone() });
    }

    fn story_not_found(&self, id: StoryId) {
        self.send(Notification::NotFound { id });
    }

    fn download_failed(&self, id: StoryId, error: &Error) {
        self.send(Notification::DownloadFailed { id, reason: (**error).to_string() });
    }
}
