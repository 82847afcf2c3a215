//! Cache Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The in-memory state is always updated before any of these can occur, so
/// a failing cache is still a usable cache; only its disk copy is behind.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The snapshot file could not be written, renamed or deleted.
    #[display("could not persist cache snapshot: {}", _0.display())]
    Persist(#[error(not(source))] PathBuf),
    /// The cached values could not be serialized.
    #[display("could not serialize cache")]
    Serialize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Persist(_))
    }
}
