use super::meta::Meta;
use super::{Extractor, absolute_image_url, text_of};
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Author, StoryModel, StoryProgress, StoryStatus};
use exn::{OptionExt, ResultExt};
use scraper::ElementRef;
use tracing::instrument;

/// Outcome of parsing a story chapter page.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryPage {
    /// The remote confirmed the story (or chapter) does not exist.
    NotFound,
    Found(ChapterPage),
}

/// Story metadata together with the body of the chapter that page carried.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterPage {
    /// A [`Transient`](StoryStatus::Transient) model stamped with the time
    /// of parsing.
    pub model: StoryModel,
    /// Inner HTML of the chapter text.
    pub body: String,
}

impl Extractor {
    /// Extracts story metadata and the chapter body from a chapter page.
    ///
    /// # Errors
    ///
    /// A page that is neither a story nor a "not found" notice, or that lacks
    /// a required field, is a parse failure.
    #[instrument(level = "debug", skip(self))]
    pub fn story_page(&self) -> Result<StoryPage> {
        if self.is_not_found() {
            return Ok(StoryPage::NotFound);
        }
        let profile = self
            .document
            .select(&consts::PROFILE_SELECTOR)
            .next()
            .ok_or_raise(|| ErrorKind::MalformedPage("story profile not present"))?;
        let meta_element = profile
            .select(&consts::META_SELECTOR)
            .next()
            .ok_or_raise(|| ErrorKind::MissingField("meta"))?;
        let meta = Meta::parse(meta_element)?;
        let (category, canon) = self.breadcrumb()?;

        let model = StoryModel {
            id: meta.id.ok_or_raise(|| ErrorKind::MissingField("id"))?,
            title: title(profile)?,
            author: profile_author(profile)?,
            canon,
            category,
            summary: profile.select(&consts::SUMMARY_SELECTOR).next().map(text_of).unwrap_or_default(),
            fragment: meta.fragment,
            progress: StoryProgress::default(),
            status: StoryStatus::Transient,
            added: crate::models::now(),
            last_read: None,
            image_url: profile
                .select(&consts::COVER_SELECTOR)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(absolute_image_url),
            chapter_titles: self.chapter_titles(),
        };
        let body = self.chapter_body()?.ok_or_raise(|| ErrorKind::MissingField("storytext"))?;
        Ok(StoryPage::Found(ChapterPage { model, body }))
    }

    /// Extracts only the chapter body. `None` when the page is a "not found"
    /// notice.
    #[instrument(level = "debug", skip(self))]
    pub fn chapter_body(&self) -> Result<Option<String>> {
        if self.is_not_found() {
            return Ok(None);
        }
        self.document
            .select(&consts::STORYTEXT_SELECTOR)
            .next()
            .map(|text| Some(text.inner_html().trim().to_string()))
            .ok_or_raise(|| ErrorKind::MissingField("storytext"))
    }

    /// `(category, canon)` from the links above the story.
    fn breadcrumb(&self) -> Result<(String, String)> {
        let crumbs = self
            .document
            .select(&consts::BREADCRUMB_SELECTOR)
            .map(text_of)
            .filter(|crumb| !crumb.is_empty())
            .collect::<Vec<_>>();
        match crumbs.as_slice() {
            [] => exn::bail!(ErrorKind::MissingField("canon")),
            [canon] => Ok((String::new(), canon.clone())),
            [category, .., canon] => Ok((category.clone(), canon.clone())),
        }
    }

    /// Titles from the chapter selector, without their `N. ` prefix. The
    /// selector appears twice on long stories; only the first is read.
    fn chapter_titles(&self) -> Vec<String> {
        let Some(select) = self.document.select(&consts::CHAPTER_SELECT_SELECTOR).next() else {
            return Vec::new();
        };
        select
            .select(&consts::OPTION_SELECTOR)
            .map(|option| consts::CHAPTER_OPTION_REGEX.replace(&text_of(option), "").into_owned())
            .collect()
    }
}

fn title(profile: ElementRef<'_>) -> Result<String> {
    profile
        .select(&consts::TITLE_SELECTOR)
        .next()
        .map(text_of)
        .filter(|title| !title.is_empty())
        .ok_or_raise(|| ErrorKind::MissingField("title"))
}

fn profile_author(profile: ElementRef<'_>) -> Result<Author> {
    let anchor = profile
        .select(&consts::AUTHOR_SELECTOR)
        .next()
        .ok_or_raise(|| ErrorKind::MissingField("author"))?;
    author_from_anchor(anchor)
}

pub(super) fn author_from_anchor(anchor: ElementRef<'_>) -> Result<Author> {
    let href = anchor.value().attr("href").unwrap_or_default();
    let id = consts::AUTHOR_URL_REGEX
        .captures(href)
        .and_then(|captures| captures.get(1))
        .ok_or_raise(|| ErrorKind::ParseError {
            field: "author",
            value: href.to_string(),
        })?;
    let id = id.as_str().parse::<u64>().or_raise(|| ErrorKind::ParseError {
        field: "author",
        value: href.to_string(),
    })?;
    Ok(Author::new(id, text_of(anchor)))
}
