use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::{Author, StoryFragment, StoryProgress, StoryStatus};
use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// Stable numeric identity of a story on the remote site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoryId(pub u64);
impl StoryId {
    pub fn get(self) -> u64 {
        self.0
    }
}
impl From<u64> for StoryId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
impl FromStr for StoryId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self).or_raise(|| ErrorKind::ParseError {
            field: "id",
            value: s.to_string(),
        })
    }
}
impl Display for StoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Everything known about a story: remote metadata plus the local state that
/// belongs to the user (progress, timestamps, status).
#[derive(Debug, Clone, PartialEq)]
pub struct StoryModel {
    pub id: StoryId,
    pub title: String,
    pub author: Author,
    pub canon: String,
    pub category: String,
    pub summary: String,
    pub fragment: StoryFragment,
    pub progress: StoryProgress,
    pub status: StoryStatus,
    /// Local only. When the story was first stored.
    pub added: UtcDateTime,
    /// Local only.
    pub last_read: Option<UtcDateTime>,
    pub image_url: Option<String>,
    /// One entry per chapter when the remote lists them, otherwise empty.
    pub chapter_titles: Vec<String>,
}
impl StoryModel {
    /// Carry local state from `existing` onto this freshly fetched model.
    ///
    /// The added/read timestamps and the reading progress always come from
    /// `existing`. The status never moves backward, see [`StoryStatus::merge`].
    #[must_use]
    pub fn merged_with(mut self, existing: &StoryModel) -> StoryModel {
        self.added = existing.added;
        self.last_read = existing.last_read;
        self.progress = existing.progress;
        self.status = existing.status.merge(self.status);
        self
    }

    /// Clamp the reading position to the current chapter count. Returns `true`
    /// if the progress had to change.
    pub fn clamp_progress(&mut self) -> bool {
        self.progress.clamp_to(self.fragment.chapters)
    }

    /// Name of the first field that cannot be persisted as-is, if any.
    pub fn invalid_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            return Some("title");
        }
        if self.author.name.trim().is_empty() {
            return Some("author");
        }
        if self.fragment.chapters == 0 {
            return Some("chapters");
        }
        if !self.progress.is_valid_for(self.fragment.chapters) {
            return Some("progress");
        }
        None
    }

    /// Title of a chapter (1-indexed), when the remote lists one.
    pub fn chapter_title(&self, chapter: u32) -> Option<&str> {
        let index = usize::try_from(chapter).ok()?.checked_sub(1)?;
        self.chapter_titles.get(index).map(String::as_str)
    }
}
impl Display for StoryModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} \"{}\" by {}", self.id, self.title, self.author.name)
    }
}
