/// User-local reading position, independent of anything the remote reports.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StoryProgress {
    /// Chapter being read; `0` means the story has not been started.
    pub current_chapter: u32,
    /// Percentage (0 to 100) scrolled within the current chapter.
    pub scroll_progress: f64,
    /// Raw scroll offset, for exact restoration.
    pub scroll_absolute: f64,
}
impl StoryProgress {
    pub fn new(current_chapter: u32, scroll_progress: f64, scroll_absolute: f64) -> Self {
        Self { current_chapter, scroll_progress, scroll_absolute }
    }

    /// Whether this progress fits a story with `chapters` chapters.
    pub fn is_valid_for(&self, chapters: u32) -> bool {
        self.current_chapter <= chapters && (0.0..=100.0).contains(&self.scroll_progress)
    }

    /// Pull the current chapter back inside `chapters`, restarting at the top
    /// of that chapter. Returns `true` if anything changed.
    pub fn clamp_to(&mut self, chapters: u32) -> bool {
        if self.current_chapter <= chapters {
            return false;
        }
        self.current_chapter = chapters;
        self.scroll_progress = 0.0;
        self.scroll_absolute = 0.0;
        true
    }
}
