use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use fray_extract::models::{StoryProgress, StoryStatus};
use sqlx::Sqlite;
use sqlx::query_builder::Separated;
use time::UtcDateTime;

/// A single locally-owned field to overwrite with
/// [`StoryStore::update_columns`](crate::StoryStore::update_columns).
///
/// Remote-derived fields are deliberately absent; those only change through
/// an upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Status(StoryStatus),
    CurrentChapter(u32),
    ScrollProgress(f64),
    ScrollAbsolute(f64),
    LastRead(Option<UtcDateTime>),
    Added(UtcDateTime),
    ChapterTitles(Vec<String>),
}
impl Column {
    /// All three progress columns at once.
    pub fn progress(progress: StoryProgress) -> [Column; 3] {
        [
            Column::CurrentChapter(progress.current_chapter),
            Column::ScrollProgress(progress.scroll_progress),
            Column::ScrollAbsolute(progress.scroll_absolute),
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Column::Status(_) => "status",
            Column::CurrentChapter(_) => "current_chapter",
            Column::ScrollProgress(_) => "scroll_progress",
            Column::ScrollAbsolute(_) => "scroll_absolute",
            Column::LastRead(_) => "last_read_at",
            Column::Added(_) => "added_at",
            Column::ChapterTitles(_) => "chapter_titles",
        }
    }

    pub(crate) fn push<'args>(&self, set: &mut Separated<'_, 'args, Sqlite, &'static str>) -> Result<()> {
        set.push(self.name()).push_unseparated(" = ");
        match self {
            Column::Status(status) => set.push_bind_unseparated(status.as_str()),
            Column::CurrentChapter(chapter) => set.push_bind_unseparated(i64::from(*chapter)),
            Column::ScrollProgress(value) | Column::ScrollAbsolute(value) => set.push_bind_unseparated(*value),
            Column::LastRead(time) => set.push_bind_unseparated(time.map(|t| t.unix_timestamp())),
            Column::Added(time) => set.push_bind_unseparated(time.unix_timestamp()),
            Column::ChapterTitles(titles) => set.push_bind_unseparated(
                serde_json::to_string(titles).or_raise(|| ErrorKind::InvalidData("chapter titles"))?,
            ),
        };
        Ok(())
    }
}
