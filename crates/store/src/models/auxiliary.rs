use super::{id_from_row, time_from_row};
use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use fray_extract::models::StoryId;
use time::UtcDateTime;

/// A user-chosen color tag on a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub story: StoryId,
    /// Packed RGB (or any other scheme the caller likes).
    pub color: u32,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MarkerRow {
    story_id: i64,
    color: i64,
}
impl TryFrom<MarkerRow> for Marker {
    type Error = Error;
    fn try_from(row: MarkerRow) -> Result<Self> {
        Ok(Self {
            story: id_from_row(row.story_id)?,
            color: u32::try_from(row.color).or_raise(|| ErrorKind::InvalidData("marker color"))?,
        })
    }
}

/// A canon listing the user wants quick access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteCanon {
    /// Site-relative path of the canon listing.
    pub path: String,
    pub title: String,
    pub added: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FavoriteRow {
    path: String,
    title: String,
    added_at: i64,
}
impl TryFrom<FavoriteRow> for FavoriteCanon {
    type Error = Error;
    fn try_from(row: FavoriteRow) -> Result<Self> {
        Ok(Self {
            path: row.path,
            title: row.title,
            added: time_from_row(row.added_at, "favorite added")?,
        })
    }
}
