mod consts;
pub mod error;
mod extract;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod models;

use tracing::instrument;

use crate::error::Result;
pub use crate::extract::{ChapterPage, Extractor, StoryPage};
use crate::models::{Canon, ListingPage, Review, StoryListing};

/// Parse a story chapter page into its metadata and chapter body, or the
/// not-found sentinel.
///
/// # Examples
///
/// ```rust
/// use fray_extract::{StoryPage, parse_story_page};
/// let html = r#"<span class="gui_warning">Story Not Found</span>"#;
/// assert_eq!(parse_story_page(html).unwrap(), StoryPage::NotFound);
/// ```
#[instrument(skip(html), fields(html_size = html.len()))]
pub fn parse_story_page(html: &str) -> Result<StoryPage> {
    Extractor::from_html(html).story_page()
}

/// Parse only the chapter body from a chapter page; `None` means not found.
#[instrument(skip(html), fields(html_size = html.len()))]
pub fn parse_chapter(html: &str) -> Result<Option<String>> {
    Extractor::from_html(html).chapter_body()
}

#[instrument(skip(html), fields(html_size = html.len()))]
pub fn parse_canon_page(html: &str) -> Result<StoryListing> {
    Extractor::from_html(html).canon_page()
}

#[instrument(skip(html), fields(html_size = html.len()))]
pub fn parse_categories(html: &str) -> Result<Vec<Canon>> {
    Extractor::from_html(html).categories()
}

#[instrument(skip(html), fields(html_size = html.len()))]
pub fn parse_reviews(html: &str) -> Result<ListingPage<Review>> {
    Extractor::from_html(html).reviews()
}
