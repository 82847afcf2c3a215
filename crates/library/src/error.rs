//! Library Error Types
//!
//! Errors from the lower crates are kept as children of these kinds, so the
//! whole tree (and every location it passed through) survives to the caller.

use derive_more::{Display, Error};
use fray_extract::models::StoryId;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The fetcher gave up for a reason other than cancellation.
    #[display("could not fetch page")]
    Fetch,
    #[display("operation cancelled")]
    Cancelled,
    /// A page did not have the expected shape. Retrying will not help.
    #[display("could not parse page")]
    Parse,
    /// A chapter page inside a story's chapter range came back "not found".
    #[display("chapter {chapter} of story {id} not found")]
    MissingChapter { id: StoryId, chapter: u32 },
    #[display("story database error")]
    Store,
    /// Writing, reading or deleting chapter files (including compression).
    #[display("chapter storage error")]
    Storage,
    #[display("page cache error")]
    Cache,
    #[display("invalid URL: {_0}")]
    Url(#[error(not(source))] String),
    #[display("story {_0} is not in the library")]
    UnknownStory(#[error(not(source))] StoryId),
    /// Only fully downloaded stories can be reconciled.
    #[display("story {_0} has not been downloaded")]
    NotMaterialized(#[error(not(source))] StoryId),
    /// The remote no longer reports an update time it reported before.
    #[display("remote lost the update time of story {_0}")]
    Inconsistent(#[error(not(source))] StoryId),
    #[display("reading position is outside story {_0}")]
    InvalidProgress(#[error(not(source))] StoryId),
}

impl ErrorKind {
    /// Wrap a fetch error, keeping cancellation recognisable as such.
    #[track_caller]
    pub(crate) fn fetch(err: fray_fetch::error::Error) -> Error {
        let kind = match *err {
            fray_fetch::error::ErrorKind::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Fetch,
        };
        err.raise(kind)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Storage | ErrorKind::Cache)
    }
}
