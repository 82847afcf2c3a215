use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use fray_extract::models::StoryId;
use url::Url;

/// Sort by update date and include every rating; the remote hides mature
/// stories from listings otherwise.
const LISTING_QUERY: &str = "srt=1&r=103";

/// Builds the URLs of the remote's page kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    base: Url,
}

impl Site {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).or_raise(|| ErrorKind::Url(base.to_string()))?;
        if base.cannot_be_a_base() {
            exn::bail!(ErrorKind::Url(base.to_string()));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Page of `chapter` (1-indexed), which also carries the story metadata.
    ///
    /// ```
    /// use fray_extract::models::StoryId;
    /// use fray_library::Site;
    /// let site = Site::new("https://fiction.test").unwrap();
    /// assert_eq!(site.story(StoryId(42), 3).unwrap().as_str(), "https://fiction.test/s/42/3/");
    /// ```
    pub fn story(&self, id: StoryId, chapter: u32) -> Result<Url> {
        self.join(&format!("/s/{id}/{chapter}/"))
    }

    /// Page `page` of the stories listed under a canon such as
    /// `/book/Harry-Potter/`.
    pub fn canon(&self, path: &str, page: u32) -> Result<Url> {
        let path = Self::site_path(path)?;
        self.join(&format!("{path}?&{LISTING_QUERY}&p={page}"))
    }

    /// The canons of a category such as `/book/`.
    pub fn category(&self, path: &str) -> Result<Url> {
        let path = Self::site_path(path)?;
        self.join(path)
    }

    /// Reviews of one chapter, or of the whole story when `chapter` is 0.
    pub fn reviews(&self, id: StoryId, chapter: u32, page: u32) -> Result<Url> {
        self.join(&format!("/r/{id}/{chapter}/{page}/"))
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base.join(path).or_raise(|| ErrorKind::Url(path.to_string()))
    }

    /// Listing paths are taken from user input; never let them name another
    /// host.
    fn site_path(path: &str) -> Result<&str> {
        if !path.starts_with('/') || path.starts_with("//") || path.contains(['?', '#']) {
            exn::bail!(ErrorKind::Url(path.to_string()));
        }
        Ok(path)
    }
}
