use std::fmt::{Display, Formatter, Result as FmtResult};

/// The account that published a story (or wrote a review).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Author {
    /// Numeric user id taken from the profile URL.
    pub id: u64,
    /// Display name
    pub name: String,
}
impl Author {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}
impl<N: Into<String>> From<(u64, N)> for Author {
    fn from((id, name): (u64, N)) -> Self {
        Self::new(id, name)
    }
}
impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} (#{})", self.name, self.id)
    }
}
