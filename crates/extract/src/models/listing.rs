use super::{Author, StoryModel};
use time::UtcDateTime;

/// A canon (fandom) entry from a category listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canon {
    pub title: String,
    /// Site-relative path of the canon listing, e.g. `/book/Harry-Potter/`.
    pub path: String,
    /// Approximate number of stories, when the listing shows one.
    pub stories: Option<u64>,
}

/// A single review left on a story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    /// `None` for guest reviews.
    pub author: Option<Author>,
    /// Name as displayed (guests pick their own).
    pub name: String,
    pub chapter: u32,
    pub posted: Option<UtcDateTime>,
    pub text: String,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage<T> {
    pub items: Vec<T>,
    /// Highest page number linked from this page (at least 1).
    pub last_page: u32,
}

pub type StoryListing = ListingPage<StoryModel>;
