//! Extraction Error Types

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// None of these are worth retrying: the same page text will fail the same
/// way until the parser changes.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The page does not have the overall shape expected of its kind.
    #[display("malformed page: {_0}")]
    MalformedPage(#[error(not(source))] &'static str),
    /// A required field could not be found in the page.
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    /// A field was found but could not be parsed.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// The offending text.
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ErrorKind::MissingField("title").to_string(), "missing required field: title");
        let err = ErrorKind::ParseError { field: "words", value: "many".to_string() };
        assert_eq!(err.to_string(), "failed to parse field 'words', found value: many");
        assert!(!err.is_retryable());
    }
}
