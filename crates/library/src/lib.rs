//! Story acquisition.
//!
//! A [`ChapterPipeline`] fetches a story's metadata into the store and its
//! chapters onto disk, keeps downloaded stories up to date with the remote,
//! and works through the download queue. Everything it touches comes from
//! the [`Context`] it is built with.

mod context;
pub mod error;
mod pipeline;
mod progress;
mod site;

pub use crate::context::{Context, LISTING_CACHE, PAGE_CACHE};
pub use crate::pipeline::{ChapterPipeline, FetchedChapter, QueueReport};
pub use crate::progress::{ChannelNotifier, Notification, Progress, TracingProgress};
pub use crate::site::Site;
