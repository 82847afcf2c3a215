use super::meta::Meta;
use super::story::author_from_anchor;
use super::{Extractor, absolute_image_url, own_text_of, text_of};
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Canon, ListingPage, StoryId, StoryListing, StoryModel, StoryProgress, StoryStatus};
use exn::{OptionExt, ResultExt};
use scraper::ElementRef;
use time::UtcDateTime;
use tracing::instrument;

impl Extractor {
    /// Extracts the story summaries from one page of a canon listing.
    ///
    /// Listings do not carry chapter titles, and every story is
    /// [`Transient`](StoryStatus::Transient).
    #[instrument(level = "debug", skip(self))]
    pub fn canon_page(&self) -> Result<StoryListing> {
        let category = self
            .document
            .select(&consts::LISTING_CRUMB_SELECTOR)
            .next()
            .map(text_of)
            .unwrap_or_default();
        let canon = self
            .document
            .select(&consts::LISTING_CANON_SELECTOR)
            .next()
            .map(text_of)
            .unwrap_or_default();
        let now = crate::models::now();
        let items = self
            .document
            .select(&consts::LISTING_ITEM_SELECTOR)
            .map(|item| listing_item(item, &category, &canon, now))
            .collect::<Result<Vec<_>>>()?;
        Ok(ListingPage {
            items,
            last_page: self.last_page(&consts::PAGE_QUERY_REGEX),
        })
    }

    /// Extracts the canons from a category listing (e.g. every book fandom).
    #[instrument(level = "debug", skip(self))]
    pub fn categories(&self) -> Result<Vec<Canon>> {
        let list = self
            .document
            .select(&consts::LIST_OUTPUT_SELECTOR)
            .next()
            .ok_or_raise(|| ErrorKind::MalformedPage("category list not present"))?;
        let mut canons = Vec::new();
        for entry in list.select(&consts::CATEGORY_ITEM_SELECTOR) {
            let Some(anchor) = entry.select(&consts::ANCHOR_SELECTOR).next() else {
                continue;
            };
            let title = anchor
                .value()
                .attr("title")
                .map(str::to_string)
                .unwrap_or_else(|| text_of(anchor));
            canons.push(Canon {
                title,
                path: anchor.value().attr("href").unwrap_or_default().to_string(),
                stories: entry.select(&consts::SPAN_SELECTOR).next().and_then(|span| story_count(&text_of(span))),
            });
        }
        Ok(canons)
    }
}

fn listing_item(item: ElementRef<'_>, category: &str, canon: &str, now: UtcDateTime) -> Result<StoryModel> {
    let anchor = item
        .select(&consts::LISTING_TITLE_SELECTOR)
        .next()
        .ok_or_raise(|| ErrorKind::MissingField("title"))?;
    let href = anchor.value().attr("href").unwrap_or_default();
    let id = consts::STORY_URL_REGEX
        .captures(href)
        .and_then(|captures| captures.get(1))
        .ok_or_raise(|| ErrorKind::ParseError {
            field: "id",
            value: href.to_string(),
        })?
        .as_str()
        .parse::<StoryId>()?;
    let author = item
        .select(&consts::AUTHOR_SELECTOR)
        .next()
        .ok_or_raise(|| ErrorKind::MissingField("author"))
        .and_then(author_from_anchor)?;
    let indent = item.select(&consts::LISTING_SUMMARY_SELECTOR).next();
    let meta = indent
        .and_then(|indent| indent.select(&consts::LISTING_META_SELECTOR).next())
        .ok_or_raise(|| ErrorKind::MissingField("meta"))?;
    let meta = Meta::parse(meta).or_raise(|| ErrorKind::ParseError {
        field: "meta",
        value: id.to_string(),
    })?;
    let image_url = item
        .select(&consts::LISTING_COVER_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("data-original").or_else(|| img.value().attr("src")))
        .map(absolute_image_url);

    Ok(StoryModel {
        id,
        title: text_of(anchor),
        author,
        canon: canon.to_string(),
        category: category.to_string(),
        summary: indent.map(own_text_of).unwrap_or_default(),
        fragment: meta.fragment,
        progress: StoryProgress::default(),
        status: StoryStatus::Transient,
        added: now,
        last_read: None,
        image_url,
        chapter_titles: Vec::new(),
    })
}

/// Abbreviated counts such as `(123.4K)`, `(1.2M)` or `(987)`.
fn story_count(text: &str) -> Option<u64> {
    let captures = consts::COUNT_REGEX.captures(text)?;
    let number = captures.get(1)?.as_str().replace(',', "").parse::<f64>().ok()?;
    let multiplier = match captures.get(2).map(|suffix| suffix.as_str()) {
        Some("K" | "k") => 1_000.0,
        Some("M" | "m") => 1_000_000.0,
        _ => 1.0,
    };
    Some((number * multiplier).round() as u64)
}
