//! Fetch Error Types

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Only [`Cancelled`](ErrorKind::Cancelled) and
/// [`Client`](ErrorKind::Client) ever escape a
/// [`PatientFetcher`](crate::PatientFetcher); everything else is retried.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection failure, timeout, or a body that could not be read.
    #[display("transport error")]
    Transport,
    /// The remote answered with a non-success status.
    #[display("unexpected response status: {_0}")]
    Status(#[error(not(source))] u16),
    /// The HTTP client could not be constructed.
    #[display("could not build HTTP client")]
    Client,
    #[display("fetch cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Status(_))
    }
}
