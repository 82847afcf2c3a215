mod author;
mod fragment;
mod listing;
mod progress;
mod rating;
mod status;
mod story;

pub use self::author::Author;
pub use self::fragment::StoryFragment;
pub use self::listing::{Canon, ListingPage, Review, StoryListing};
pub use self::progress::StoryProgress;
pub use self::rating::Rating;
pub use self::status::StoryStatus;
pub use self::story::{StoryId, StoryModel};

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace(' ', "")
}

/// The current time, truncated to the whole seconds stories are stored with.
pub fn now() -> time::UtcDateTime {
    let now = time::UtcDateTime::now();
    now.replace_nanosecond(0).unwrap_or(now)
}
