//! Page extraction for the remote site.

mod listing;
mod meta;
mod reviews;
mod story;

pub use self::story::{ChapterPage, StoryPage};
use crate::consts;
use regex::Regex;
use scraper::{ElementRef, Html};

/// A parsed page, ready for one of the page-specific extractions.
///
/// Which extraction applies depends on the URL the page was fetched from; the
/// page text alone is not always enough to tell.
#[derive(Debug)]
pub struct Extractor {
    document: Html,
}
impl Extractor {
    pub fn from_document(document: Html) -> Self {
        Self { document }
    }

    pub fn from_html(html: &str) -> Self {
        Self::from_document(Html::parse_document(html))
    }

    /// Whether the remote answered with its "not found" notice instead of
    /// content. This is a permanent condition, not a fetch failure.
    pub fn is_not_found(&self) -> bool {
        self.document
            .select(&consts::WARNING_SELECTOR)
            .any(|warning| consts::NOT_FOUND_REGEX.is_match(&text_of(warning)))
    }

    /// Highest page number linked from the document, at least 1.
    fn last_page(&self, pattern: &Regex) -> u32 {
        self.document
            .select(&consts::ANCHOR_SELECTOR)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter_map(|href| pattern.captures(href)?.get(1)?.as_str().parse::<u32>().ok())
            .max()
            .unwrap_or(1)
            .max(1)
    }
}
impl From<Html> for Extractor {
    fn from(document: Html) -> Self {
        Self::from_document(document)
    }
}

/// Element text with runs of whitespace collapsed to single spaces.
fn text_of(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Only the text nodes directly inside `element`, ignoring child elements.
fn own_text_of(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .flat_map(|text| text.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Protocol-relative image URLs (`//host/path`) are made absolute.
fn absolute_image_url(src: &str) -> String {
    match src.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => src.to_string(),
    }
}
