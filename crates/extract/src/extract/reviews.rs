use super::meta::timestamp;
use super::story::author_from_anchor;
use super::{Extractor, own_text_of, text_of};
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{ListingPage, Review};
use exn::{OptionExt, ResultExt};
use scraper::ElementRef;
use tracing::instrument;

impl Extractor {
    /// Extracts one page of reviews. A story without reviews has no review
    /// table at all, which yields an empty page.
    #[instrument(level = "debug", skip(self))]
    pub fn reviews(&self) -> Result<ListingPage<Review>> {
        let Some(table) = self.document.select(&consts::REVIEW_TABLE_SELECTOR).next() else {
            return Ok(ListingPage { items: Vec::new(), last_page: 1 });
        };
        let items = table.select(&consts::REVIEW_SELECTOR).map(review).collect::<Result<Vec<_>>>()?;
        Ok(ListingPage {
            items,
            last_page: self.last_page(&consts::REVIEW_PAGE_REGEX),
        })
    }
}

fn review(cell: ElementRef<'_>) -> Result<Review> {
    let author = cell.select(&consts::AUTHOR_SELECTOR).next().map(author_from_anchor).transpose()?;
    let name = match &author {
        Some(author) => author.name.clone(),
        // Guests type their name as plain text ahead of the date line.
        None => own_text_of(cell),
    };
    let small = cell
        .select(&consts::SMALL_SELECTOR)
        .next()
        .ok_or_raise(|| ErrorKind::MissingField("review chapter"))?;
    let small_text = text_of(small);
    let chapter = consts::REVIEW_CHAPTER_REGEX
        .captures(&small_text)
        .and_then(|captures| captures.get(1))
        .ok_or_raise(|| ErrorKind::MissingField("review chapter"))?;
    let chapter = chapter.as_str().parse::<u32>().or_raise(|| ErrorKind::ParseError {
        field: "review chapter",
        value: small_text.clone(),
    })?;
    let posted = small
        .select(&consts::TIMESTAMP_SELECTOR)
        .next()
        .and_then(|span| span.value().attr("data-xutime"))
        .map(timestamp)
        .transpose()?;
    Ok(Review {
        author,
        name,
        chapter,
        posted,
        text: cell.select(&consts::DIV_SELECTOR).next().map(text_of).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;
    use time::macros::utc_datetime;

    const REVIEWS: &str = "<table id='gui_table1i'><tbody>\
        <tr><td style='padding-top:10px'><img class='round36' src='/static/images/d_60_90.jpg'>\
        <a href='/u/555/Reader'>Reader</a> <small style='color:gray'>chapter 3 . \
        <span data-xutime='1500000000'>Jul 14, 2017</span></small>\
        <div style='margin-top:5px'>Loved the ending!</div></td></tr>\
        <tr><td style='padding-top:10px'><img class='round36' src='/static/images/d_60_90.jpg'>\
        A passing guest <small style='color:gray'>chapter 1 . <span data-xutime='1400000000'>May 13, 2014</span></small>\
        <div style='margin-top:5px'>More please.</div></td></tr>\
        </tbody></table>\
        <a href='/r/42/0/2/'>2</a> <a href='/r/42/0/5/'>Last</a>";

    #[test]
    fn test_reviews() {
        let page = Extractor::from_html(REVIEWS).reviews().unwrap();
        assert_eq!(page.last_page, 5);
        assert_eq!(
            page.items,
            vec![
                Review {
                    author: Some(Author::new(555, "Reader")),
                    name: "Reader".to_string(),
                    chapter: 3,
                    posted: Some(utc_datetime!(2017-07-14 02:40)),
                    text: "Loved the ending!".to_string(),
                },
                Review {
                    author: None,
                    name: "A passing guest".to_string(),
                    chapter: 1,
                    posted: Some(utc_datetime!(2014-05-13 16:53:20)),
                    text: "More please.".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_no_reviews() {
        let page = Extractor::from_html("<div>No Reviews found.</div>").reviews().unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.last_page, 1);
    }

    #[test]
    fn test_review_without_chapter() {
        let html = "<table id='gui_table1i'><tr><td><a href='/u/1/x'>x</a><div>hi</div></td></tr></table>";
        let err = Extractor::from_html(html).reviews().unwrap_err();
        assert_eq!(*err, ErrorKind::MissingField("review chapter"));
    }
}
