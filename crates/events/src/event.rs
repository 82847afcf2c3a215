use fray_extract::models::{StoryId, StoryModel};
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    New,
    Changed,
    Removed,
}
impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            ChangeKind::New => "new",
            ChangeKind::Changed => "changed",
            ChangeKind::Removed => "removed",
        })
    }
}

/// What happened, and to which stories. Events carry no identity beyond
/// their payload; their order is the order they were published in.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub stories: Vec<StoryModel>,
}
impl ChangeEvent {
    pub fn new(kind: ChangeKind, stories: Vec<StoryModel>) -> Self {
        Self { kind, stories }
    }

    pub fn created(story: StoryModel) -> Self {
        Self::new(ChangeKind::New, vec![story])
    }

    pub fn changed(story: StoryModel) -> Self {
        Self::new(ChangeKind::Changed, vec![story])
    }

    pub fn removed(story: StoryModel) -> Self {
        Self::new(ChangeKind::Removed, vec![story])
    }

    pub fn ids(&self) -> impl Iterator<Item = StoryId> + '_ {
        self.stories.iter().map(|story| story.id)
    }
}
