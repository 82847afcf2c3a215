use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Shown instead of the story when it (or the requested chapter) does not exist.
selector!(WARNING_SELECTOR, "span.gui_warning");
regex!(NOT_FOUND_REGEX, r"(?i)(story|chapter) not found");

// Story chapter page.
selector!(PROFILE_SELECTOR, "#profile_top");
selector!(TITLE_SELECTOR, "b.xcontrast_txt");
selector!(AUTHOR_SELECTOR, "a[href^='/u/']");
regex!(AUTHOR_URL_REGEX, r"^/u/(\d+)(?:/|$)");
selector!(SUMMARY_SELECTOR, "div.xcontrast_txt");
selector!(META_SELECTOR, "span.xgray");
selector!(TIMESTAMP_SELECTOR, "span[data-xutime]");
selector!(COVER_SELECTOR, "img.cimage");
selector!(BREADCRUMB_SELECTOR, "#pre_story_links a");
selector!(CHAPTER_SELECT_SELECTOR, "select#chap_select");
selector!(OPTION_SELECTOR, "option");
regex!(CHAPTER_OPTION_REGEX, r"^\s*\d+\.\s*");
selector!(STORYTEXT_SELECTOR, "#storytext");

// Canon listing page.
selector!(LISTING_CRUMB_SELECTOR, "#content_wrapper_inner div.lc-left a");
selector!(LISTING_CANON_SELECTOR, "#content_wrapper_inner div.lc-left b");
selector!(LISTING_ITEM_SELECTOR, "div.z-list");
selector!(LISTING_TITLE_SELECTOR, "a.stitle");
regex!(STORY_URL_REGEX, r"^/s/(\d+)(?:/|$)");
selector!(LISTING_SUMMARY_SELECTOR, "div.z-indent");
selector!(LISTING_META_SELECTOR, "div.z-padtop2");
selector!(LISTING_COVER_SELECTOR, "img.cimage");

// Category listing page.
selector!(LIST_OUTPUT_SELECTOR, "#list_output");
selector!(CATEGORY_ITEM_SELECTOR, "#list_output td > div");
selector!(ANCHOR_SELECTOR, "a[href]");
selector!(SPAN_SELECTOR, "span");
regex!(COUNT_REGEX, r"([\d.,]+)\s*([KkMm])?");

// Review listing page.
selector!(REVIEW_TABLE_SELECTOR, "#gui_table1i");
selector!(REVIEW_SELECTOR, "#gui_table1i td");
selector!(SMALL_SELECTOR, "small");
regex!(REVIEW_CHAPTER_REGEX, r"(?i)chapter\s+(\d+)");
selector!(DIV_SELECTOR, "div");

// Pagination: listings use a `p=` query parameter, reviews a `/r/<id>/<chapter>/<page>/` path.
regex!(PAGE_QUERY_REGEX, r"[?&]p=(\d+)");
regex!(REVIEW_PAGE_REGEX, r"^/r/\d+/\d+/(\d+)/?");

// Meta line tokens, e.g. `Words: 12,345`.
regex!(META_KEYED_REGEX, r"^([A-Za-z]+):\s*(.*)$");

/// Every genre the remote knows about.
pub(crate) const GENRES: &[&str] = &[
    "Adventure",
    "Angst",
    "Crime",
    "Drama",
    "Family",
    "Fantasy",
    "Friendship",
    "General",
    "Horror",
    "Humor",
    "Hurt/Comfort",
    "Mystery",
    "Parody",
    "Poetry",
    "Romance",
    "Sci-Fi",
    "Spiritual",
    "Supernatural",
    "Suspense",
    "Tragedy",
    "Western",
];
