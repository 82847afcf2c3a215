use derive_more::{Display, Error};
use fray_extract::models::StoryId;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not open the library")]
    Setup,
    #[display("command failed")]
    Command,
    #[display("story {_0} is not in the library")]
    UnknownStory(#[error(not(source))] StoryId),
    #[display("story {_0} was not found on the remote")]
    NotFound(#[error(not(source))] StoryId),
    #[display("chapter {chapter} of story {id} has not been downloaded")]
    NotDownloaded { id: StoryId, chapter: u32 },
}
