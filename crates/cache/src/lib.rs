//! Key/value cache with a time-to-live per entry.
//!
//! Entries live in memory; every change is followed by a full snapshot of the
//! map to one file per cache, so the latest state survives a restart. The
//! snapshot is disposable: an unreadable file is deleted and the cache starts
//! empty.

mod cache;
pub mod error;
mod snapshot;

pub use crate::cache::{CacheEntry, ExpiringCache};
