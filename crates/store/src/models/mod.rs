mod auxiliary;
mod story;

pub use self::auxiliary::{FavoriteCanon, Marker};
pub(crate) use self::auxiliary::{FavoriteRow, MarkerRow};
pub(crate) use self::story::StoryRow;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use fray_extract::models::StoryId;
use time::UtcDateTime;

pub(crate) fn id_to_row(id: StoryId) -> Result<i64> {
    i64::try_from(id.get()).or_raise(|| ErrorKind::InvalidData("story id"))
}

pub(crate) fn id_from_row(id: i64) -> Result<StoryId> {
    u64::try_from(id).map(StoryId).or_raise(|| ErrorKind::InvalidData("story id"))
}

pub(crate) fn time_from_row(seconds: i64, field: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData(field))
}
