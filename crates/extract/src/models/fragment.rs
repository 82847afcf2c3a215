use super::Rating;
use time::UtcDateTime;

/// Story metadata as reported by the remote at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryFragment {
    pub rating: Rating,
    pub language: String,
    pub words: u64,
    /// Always at least 1.
    pub chapters: u32,
    pub favorites: u64,
    pub follows: u64,
    pub reviews: u64,
    pub genres: Vec<String>,
    pub characters: Vec<String>,
    pub published: Option<UtcDateTime>,
    /// `None` when the remote has never recorded an update.
    pub updated: Option<UtcDateTime>,
    pub completed: bool,
}
