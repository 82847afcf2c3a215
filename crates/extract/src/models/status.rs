use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// How much of a story exists locally.
///
/// The variants are ordered by fidelity: a story only ever moves forward
/// through `Transient` → `Remote` → `Local` during normal flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoryStatus {
    /// Metadata is known, nothing has been persisted as "added".
    #[default]
    Transient,
    /// Persisted, but chapters have not all been materialized.
    Remote,
    /// Every chapter is materialized on disk.
    Local,
}
impl StoryStatus {
    /// Resolve the status to store when `incoming` (from a fresh fetch)
    /// replaces a row currently stored as `existing`.
    ///
    /// Never moves backward: a fetch reporting `Transient`, or `Remote` over a
    /// stored `Local`, keeps the stored status.
    ///
    /// ```
    /// use fray_extract::models::StoryStatus::*;
    /// assert_eq!(Local.merge(Remote), Local);
    /// assert_eq!(Remote.merge(Local), Local);
    /// assert_eq!(Remote.merge(Transient), Remote);
    /// ```
    #[must_use]
    pub fn merge(self, incoming: StoryStatus) -> StoryStatus {
        self.max(incoming)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Transient => "transient",
            StoryStatus::Remote => "remote",
            StoryStatus::Local => "local",
        }
    }
}
impl FromStr for StoryStatus {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "transient" => Self::Transient,
            "remote" => Self::Remote,
            "local" => Self::Local,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "status",
                value: s.to_string(),
            }),
        })
    }
}
impl Display for StoryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::StoryStatus::{self, *};
    use rstest::rstest;

    #[rstest]
    #[case(Transient, Transient, Transient)]
    #[case(Transient, Remote, Remote)]
    #[case(Transient, Local, Local)]
    #[case(Remote, Transient, Remote)]
    #[case(Remote, Remote, Remote)]
    #[case(Remote, Local, Local)]
    #[case(Local, Transient, Local)]
    #[case(Local, Remote, Local)]
    #[case(Local, Local, Local)]
    fn test_merge_never_moves_backward(
        #[case] existing: StoryStatus,
        #[case] incoming: StoryStatus,
        #[case] expected: StoryStatus,
    ) {
        assert_eq!(existing.merge(incoming), expected);
    }

    #[test]
    fn test_str_round_trip() {
        for status in [Transient, Remote, Local] {
            assert_eq!(status.as_str().parse::<StoryStatus>().unwrap(), status);
        }
        assert!("downloaded".parse::<StoryStatus>().is_err());
    }
}
