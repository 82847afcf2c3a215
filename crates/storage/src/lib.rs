//! Where materialized chapters live: a [`StorageBackend`] abstraction with
//! local-filesystem and in-memory implementations, and the [`ChapterStore`]
//! layout on top of it.

pub mod backend;
mod chapters;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::chapters::ChapterStore;
pub use crate::models::FileInfo;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
