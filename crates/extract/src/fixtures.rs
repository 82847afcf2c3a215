//! Generated pages shaped like the remote's, for tests here and downstream.

/// What the remote serves for a story or chapter that does not exist.
pub const NOT_FOUND_PAGE: &str = "<html><body><div id='content_wrapper_inner'>\
    <span class='gui_warning'>Story Not Found<hr size=1 noshade>Unable to locate story. Code 1.</span>\
    </div></body></html>";

/// Default body of a chapter page.
pub fn chapter_text(id: u64, chapter: u32) -> String {
    format!("<p>Story {id}, chapter {chapter}.</p>")
}

/// Builder for a story chapter page.
#[derive(Debug, Clone)]
pub struct StoryPageFixture {
    id: u64,
    chapters: u32,
    chapter: u32,
    words: u64,
    published: i64,
    updated: Option<i64>,
    complete: bool,
    body: Option<String>,
}
impl StoryPageFixture {
    pub fn new(id: u64, chapters: u32) -> Self {
        Self {
            id,
            chapters,
            chapter: 1,
            words: 1_000 * u64::from(chapters),
            published: 1_500_000_000,
            updated: Some(1_600_000_000),
            complete: false,
            body: None,
        }
    }

    pub fn chapter(mut self, chapter: u32) -> Self {
        self.chapter = chapter;
        self
    }

    /// Unix seconds of the last update, `None` for a story never updated.
    pub fn updated(mut self, updated: Option<i64>) -> Self {
        self.updated = updated;
        self
    }

    pub fn complete(mut self, complete: bool) -> Self {
        self.complete = complete;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn html(&self) -> String {
        let id = self.id;
        let mut meta = vec![
            "<a class='xcontrast_txt' href='https://www.fictionratings.com/' target='rating'>Rated: Fiction  T</a>"
                .to_string(),
            "English".to_string(),
            "Adventure/Drama".to_string(),
            "Harry P., Hermione G.".to_string(),
        ];
        if self.chapters > 1 {
            meta.push(format!("Chapters: {}", self.chapters));
        }
        meta.push(format!("Words: {}", self.words));
        meta.push(format!("Reviews: <a href='/r/{id}/'>3</a>"));
        meta.push("Favs: 4".to_string());
        meta.push("Follows: 5".to_string());
        if let Some(updated) = self.updated {
            meta.push(format!("Updated: <span data-xutime='{updated}'>Sep 13, 2020</span>"));
        }
        meta.push(format!("Published: <span data-xutime='{}'>Jul 14, 2017</span>", self.published));
        if self.complete {
            meta.push("Status: Complete".to_string());
        }
        meta.push(format!("id: {id}"));

        let select = if self.chapters > 1 {
            let options = (1..=self.chapters)
                .map(|n| {
                    let selected = if n == self.chapter { " selected" } else { "" };
                    format!("<option value={n}{selected}>{n}. Chapter {n}</option>")
                })
                .collect::<String>();
            format!("<select id=chap_select title='Chapter Navigation'>{options}</select>")
        } else {
            String::new()
        };
        let body = self.body.clone().unwrap_or_else(|| chapter_text(id, self.chapter));

        format!(
            "<html><body><div id='content_wrapper_inner'>\
             <div id='pre_story_links'><span class='lc-left'>\
             <a class='xcontrast_txt' href='/book/'>Books</a>\
             <span class='xcontrast_txt icon-chevron-right xicon-section-arrow'></span>\
             <a class='xcontrast_txt' href='/book/Harry-Potter/'>Harry Potter</a></span></div>\
             <div id='profile_top'>\
             <span class='novisited'><img class='cimage' src='//img.example/image/{id}/75/'></span>\
             <b class='xcontrast_txt'>Story {id}</b>\
             <span class='xcontrast_txt'><div style='height:5px'></div>By:</span> \
             <a class='xcontrast_txt' href='/u/{author}/author{id}'>author{id}</a>\
             <div style='margin-top:2px' class='xcontrast_txt'>A summary of story {id}.</div>\
             <span class='xgray xcontrast_txt'>{meta}</span></div>\
             {select}\
             <div class='storytext xcontrast_txt nocopy' id='storytext'>{body}</div>\
             {select}\
             </div></body></html>",
            author = 1_000 + id,
            meta = meta.join(" - "),
        )
    }
}

/// A canon listing page holding one-chapter stories with the given ids.
pub fn canon_listing(ids: &[u64], last_page: u32) -> String {
    let items = ids
        .iter()
        .map(|id| {
            format!(
                "<div class='z-list zhover zpointer'>\
                 <a class='stitle' href='/s/{id}/1/Story-{id}'><img class='cimage' data-original='/image/{id}/75/'>Story {id}</a> \
                 by <a href='/u/{author}/author{id}'>author{id}</a> <a class='reviews' href='/r/{id}/'>reviews</a>\
                 <div class='z-indent z-padtop'>A summary of story {id}.\
                 <div class='z-padtop2 xgray'>Rated: K+ - English - Humor - Words: 1,200 - Reviews: 2 - Favs: 3 - \
                 Follows: 1 - Published: <span data-xutime='1500000000'>Jul 14, 2017</span> - Luna L. - Complete</div>\
                 </div></div>",
                author = 1_000 + id,
            )
        })
        .collect::<String>();
    format!(
        "<html><body><div id='content_wrapper_inner'>\
         <div class='lc-left'><a href='/book/'>Books</a> <span>&#187;</span> <b>Harry Potter</b></div>\
         <center><a href='/book/Harry-Potter/?&srt=1&r=103&p={last_page}'>Last</a></center>\
         {items}</div></body></html>"
    )
}
