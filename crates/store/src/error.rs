//! Store Error Types

use derive_more::{Display, Error};
use fray_extract::models::StoryId;

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A row broke a table constraint other than story uniqueness.
    #[display("constraint violation")]
    Constraint,
    #[display("story not found: {_0}")]
    NotFound(#[error(not(source))] StoryId),
    /// A value could not be converted to or from its stored form.
    #[display("invalid data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Busy/locked databases surface as generic database errors.
        matches!(self, ErrorKind::Database)
    }
}

/// Database errors that are constraint violations are reported as such, the
/// rest as generic database errors.
pub(crate) fn classify(err: &sqlx::Error) -> ErrorKind {
    match err.as_database_error().map(|db| db.kind()) {
        Some(
            sqlx::error::ErrorKind::CheckViolation
            | sqlx::error::ErrorKind::NotNullViolation
            | sqlx::error::ErrorKind::ForeignKeyViolation
            | sqlx::error::ErrorKind::UniqueViolation,
        ) => ErrorKind::Constraint,
        _ => ErrorKind::Database,
    }
}
