//! The " - " separated metadata line shown under every story, both on its own
//! page and in listings.

use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Rating, StoryFragment, StoryId};
use exn::{OptionExt, ResultExt};
use scraper::ElementRef;
use time::UtcDateTime;
use tracing::instrument;

#[derive(Debug)]
pub(crate) struct Meta {
    pub id: Option<StoryId>,
    pub fragment: StoryFragment,
}
impl Meta {
    #[instrument(level = "trace", skip(element))]
    pub fn parse(element: ElementRef<'_>) -> Result<Self> {
        let text = super::text_of(element);
        let mut stamps = element
            .select(&consts::TIMESTAMP_SELECTOR)
            .filter_map(|span| span.value().attr("data-xutime"))
            .collect::<Vec<_>>()
            .into_iter();

        let mut id = None;
        let mut rating = None;
        let mut language = None;
        let mut words = None;
        let mut chapters = 1;
        let mut favorites = 0;
        let mut follows = 0;
        let mut reviews = 0;
        let mut genres = Vec::new();
        let mut characters = Vec::new();
        let mut published = None;
        let mut updated = None;
        let mut completed = false;

        for token in text.split(" - ").map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(captures) = consts::META_KEYED_REGEX.captures(token)
                && let (Some(key), Some(value)) = (captures.get(1), captures.get(2))
            {
                let value = value.as_str().trim();
                match key.as_str() {
                    "Rated" => rating = Some(value.parse::<Rating>()?),
                    "Chapters" => chapters = count(value, "chapters")?,
                    "Words" => words = Some(count(value, "words")?),
                    "Reviews" => reviews = count(value, "reviews")?,
                    "Favs" => favorites = count(value, "favorites")?,
                    "Follows" => follows = count(value, "follows")?,
                    "Updated" => updated = stamps.next().map(timestamp).transpose()?,
                    "Published" => published = stamps.next().map(timestamp).transpose()?,
                    "Status" => completed = value.eq_ignore_ascii_case("complete"),
                    "id" => id = Some(value.parse::<StoryId>()?),
                    _ => tracing::trace!(key = key.as_str(), "ignoring unknown meta field"),
                }
                continue;
            }
            if token == "Complete" {
                completed = true;
            } else if language.is_none() {
                language = Some(token.to_string());
            } else if genres.is_empty()
                && characters.is_empty()
                && let Some(list) = split_genres(token)
            {
                genres = list;
            } else if characters.is_empty() {
                characters = split_characters(token);
            }
        }

        if chapters == 0 {
            exn::bail!(ErrorKind::ParseError {
                field: "chapters",
                value: "0".to_string(),
            });
        }
        Ok(Self {
            id,
            fragment: StoryFragment {
                rating: rating.ok_or_raise(|| ErrorKind::MissingField("rating"))?,
                language: language.ok_or_raise(|| ErrorKind::MissingField("language"))?,
                words: words.ok_or_raise(|| ErrorKind::MissingField("words"))?,
                chapters: u32::try_from(chapters).or_raise(|| ErrorKind::ParseError {
                    field: "chapters",
                    value: chapters.to_string(),
                })?,
                favorites,
                follows,
                reviews,
                genres,
                characters,
                published,
                updated,
                completed,
            },
        })
    }
}

fn count(value: &str, field: &'static str) -> Result<u64> {
    value.replace(',', "").parse::<u64>().or_raise(|| ErrorKind::ParseError {
        field,
        value: value.to_string(),
    })
}

pub(crate) fn timestamp(value: &str) -> Result<UtcDateTime> {
    let seconds = value.trim().parse::<i64>().or_raise(|| ErrorKind::ParseError {
        field: "timestamp",
        value: value.to_string(),
    })?;
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::ParseError {
        field: "timestamp",
        value: value.to_string(),
    })
}

/// `Some` only if every `/`-separated part is a known genre.
fn split_genres(token: &str) -> Option<Vec<String>> {
    // The one genre with a slash in its name.
    let token = token.replace("Hurt/Comfort", "Hurt\u{0}Comfort");
    token
        .split('/')
        .map(|genre| genre.trim().replace('\u{0}', "/"))
        .map(|genre| consts::GENRES.contains(&genre.as_str()).then_some(genre))
        .collect()
}

/// Pairings are shown as `[A, B] C`; only the names are kept.
fn split_characters(token: &str) -> Vec<String> {
    token
        .split([',', '[', ']'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
