use crate::error::Result;
use crate::snapshot::{self, FORMAT, Loaded, Snapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

/// A cached value and the moment (Unix milliseconds) it stops being served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: i64,
}
impl<T> CacheEntry<T> {
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }
}

fn now_millis() -> i64 {
    i64::try_from(UtcDateTime::now().unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Memory-resident key/value store whose entries expire a fixed time after
/// they were written, snapshotted to disk after every change.
///
/// Safe to share between tasks (behind an `Arc`) without further locking.
pub struct ExpiringCache<T> {
    name: String,
    path: Option<PathBuf>,
    ttl_millis: i64,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    // Held while a snapshot is taken and written, so that snapshots land on
    // disk in the order they were taken.
    persist: tokio::sync::Mutex<()>,
}

impl<T> ExpiringCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// A cache snapshotted to `<directory>/<name>.cache.json`. Nothing is read
    /// until [`deserialize`](Self::deserialize) is called.
    pub fn new(name: impl Into<String>, directory: impl AsRef<Path>, ttl: Duration) -> Self {
        let name = name.into();
        let path = directory.as_ref().join(format!("{name}.cache.json"));
        Self::build(name, Some(path), ttl)
    }

    /// A cache that never touches the disk.
    pub fn in_memory(name: impl Into<String>, ttl: Duration) -> Self {
        Self::build(name.into(), None, ttl)
    }

    fn build(name: String, path: Option<PathBuf>, ttl: Duration) -> Self {
        Self {
            name,
            path,
            ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            entries: Mutex::new(HashMap::new()),
            persist: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.ttl_millis).unwrap_or_default())
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value`, expiring one TTL from now, then persist the snapshot.
    ///
    /// The value is served from memory even if persisting fails.
    #[instrument(level = "debug", skip(self, key, value), fields(cache = %self.name))]
    pub async fn update(&self, key: impl Into<String>, value: T) -> Result<()> {
        self.update_at(key.into(), value, now_millis()).await
    }

    pub(crate) async fn update_at(&self, key: String, value: T, now: i64) -> Result<()> {
        {
            let mut entries = self.entries();
            // Expired entries are not worth carrying into the snapshot.
            entries.retain(|_, entry| !entry.is_expired_at(now));
            let expires_at = now.saturating_add(self.ttl_millis);
            entries.insert(key, CacheEntry { value, expires_at });
        }
        self.serialize().await
    }

    /// The value stored under `key`, unless it is missing or has expired. An
    /// expired entry is evicted and the eviction persisted.
    #[instrument(level = "debug", skip(self), fields(cache = %self.name))]
    pub async fn hit(&self, key: &str) -> Option<T> {
        self.hit_at(key, now_millis()).await
    }

    pub(crate) async fn hit_at(&self, key: &str, now: i64) -> Option<T> {
        {
            let mut entries = self.entries();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
                Some(_) => {},
            }
            entries.remove(key);
        }
        tracing::debug!(key, "evicted expired cache entry");
        if let Err(err) = self.serialize().await {
            tracing::warn!(error = ?err, "failed to persist cache eviction");
        }
        None
    }

    /// Evict every expired entry. Returns how many were evicted.
    pub async fn purge(&self) -> Result<usize> {
        self.purge_at(now_millis()).await
    }

    pub(crate) async fn purge_at(&self, now: i64) -> Result<usize> {
        let evicted = {
            let mut entries = self.entries();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(now));
            before - entries.len()
        };
        if evicted > 0 {
            tracing::info!(cache = %self.name, evicted, "purged expired cache entries");
            self.serialize().await?;
        }
        Ok(evicted)
    }

    /// Drop every entry and delete the snapshot file.
    ///
    /// Memory is cleared even when the file cannot be deleted; the error then
    /// reports that disk and memory disagree until the next update.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub async fn clear(&self) -> Result<()> {
        self.entries().clear();
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _persist = self.persist.lock().await;
        snapshot::delete(path).await
    }

    /// Load the snapshot from disk, replacing what is in memory. Returns how
    /// many unexpired entries were loaded.
    ///
    /// A missing snapshot is an empty cache. An unusable one is deleted and
    /// also yields an empty cache; only failing to delete it is an error.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub async fn deserialize(&self) -> Result<usize> {
        let Some(path) = &self.path else {
            return Ok(0);
        };
        let _persist = self.persist.lock().await;
        let now = now_millis();
        let loaded = match snapshot::read::<T>(path, &self.name).await {
            Loaded::Missing => HashMap::new(),
            Loaded::Unusable(reason) => {
                tracing::warn!(path = %path.display(), reason, "discarding unusable cache snapshot");
                self.entries().clear();
                snapshot::delete(path).await?;
                return Ok(0);
            },
            Loaded::Found(mut entries) => {
                entries.retain(|_, entry| !entry.is_expired_at(now));
                entries
            },
        };
        let count = loaded.len();
        *self.entries() = loaded;
        tracing::debug!(entries = count, "loaded cache snapshot");
        Ok(count)
    }

    /// Write the whole map to disk.
    pub async fn serialize(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _persist = self.persist.lock().await;
        let snapshot = Snapshot {
            format: FORMAT,
            name: self.name.clone(),
            entries: self.entries().clone(),
        };
        snapshot::write(path, &snapshot).await
    }
}

impl<T> std::fmt::Debug for ExpiringCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("ttl_millis", &self.ttl_millis)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;
    use std::sync::Arc;

    const DAY: i64 = 24 * 60 * 60 * 1000;

    fn cache(dir: &Path, ttl_millis: i64) -> ExpiringCache<String> {
        ExpiringCache::new("Category", dir, Duration::from_millis(ttl_millis as u64))
    }

    fn file_keys(cache: &ExpiringCache<String>) -> Vec<String> {
        let bytes = std::fs::read(cache.path().unwrap()).unwrap();
        let snapshot: Snapshot<String> = serde_json::from_slice(&bytes).unwrap();
        let mut keys = snapshot.entries.into_keys().collect::<Vec<_>>();
        keys.sort();
        keys
    }

    #[rstest]
    #[case(0, true)]
    #[case(999, true)]
    #[case(1_000, false)]
    #[case(5_000, false)]
    #[tokio::test]
    async fn test_hit_respects_ttl(#[case] elapsed: i64, #[case] served: bool) {
        let cache = ExpiringCache::<u32>::in_memory("story", Duration::from_secs(1));
        cache.update_at("42-1".to_string(), 7, 10_000).await.unwrap();
        let expected = served.then_some(7);
        assert_eq!(cache.hit_at("42-1", 10_000 + elapsed).await, expected);
    }

    #[tokio::test]
    async fn test_update_resets_expiry() {
        let cache = ExpiringCache::<u32>::in_memory("story", Duration::from_secs(1));
        cache.update_at("k".to_string(), 1, 0).await.unwrap();
        cache.update_at("k".to_string(), 2, 900).await.unwrap();
        assert_eq!(cache.hit_at("k", 1_500).await, Some(2));
        assert_eq!(cache.hit_at("k", 1_900).await, None);
    }

    #[tokio::test]
    async fn test_expiry_edge_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 7 * DAY);
        cache.update_at("books-1".to_string(), "listing".to_string(), 0).await.unwrap();
        cache.update_at("anime-1".to_string(), "other".to_string(), 10).await.unwrap();
        assert_eq!(file_keys(&cache), vec!["anime-1", "books-1"]);

        assert_eq!(cache.hit_at("books-1", 7 * DAY - 1).await.as_deref(), Some("listing"));
        assert_eq!(cache.hit_at("books-1", 7 * DAY + 1).await, None);
        assert_eq!(file_keys(&cache), vec!["anime-1"]);

        cache.update_at("games-1".to_string(), "third".to_string(), 7 * DAY + 2).await.unwrap();
        assert_eq!(file_keys(&cache), vec!["anime-1", "games-1"]);
    }

    #[tokio::test]
    async fn test_round_trip_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let original = cache(dir.path(), DAY);
        for n in 0..25 {
            original.update(format!("{n}-1"), format!("<p>chapter {n}</p>")).await.unwrap();
        }

        let restarted = cache(dir.path(), DAY);
        assert!(restarted.is_empty());
        assert_eq!(restarted.deserialize().await.unwrap(), 25);
        for n in 0..25 {
            assert_eq!(restarted.hit(&format!("{n}-1")).await, Some(format!("<p>chapter {n}</p>")));
        }
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let original = cache(dir.path(), DAY);
        original.update_at("old".to_string(), "x".to_string(), 0).await.unwrap();
        original.update("new".to_string(), "y".to_string()).await.unwrap();
        let restarted = cache(dir.path(), DAY);
        assert_eq!(restarted.deserialize().await.unwrap(), 1);
    }

    #[rstest]
    #[case(b"{ this is not json".as_slice())]
    #[case(br#"{"format":99,"name":"Category","entries":{}}"#.as_slice())]
    #[case(br#"{"format":1,"name":"Reviews","entries":{}}"#.as_slice())]
    #[case(br#"{"format":1,"name":"Category","entries":{"k":{"value":5,"expires_at":1}}}"#.as_slice())]
    #[tokio::test]
    async fn test_unusable_snapshot_is_cold_start(#[case] contents: &[u8]) {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), DAY);
        std::fs::write(cache.path().unwrap(), contents).unwrap();
        assert_eq!(cache.deserialize().await.unwrap(), 0);
        assert!(cache.is_empty());
        assert!(!cache.path().unwrap().exists());
        // Still fully usable afterwards.
        cache.update("k", "v".to_string()).await.unwrap();
        assert_eq!(cache.hit("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cache(dir.path(), DAY).deserialize().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), DAY);
        cache.update("k", "v".to_string()).await.unwrap();
        assert!(cache.path().unwrap().exists());
        cache.clear().await.unwrap();
        assert!(cache.is_empty());
        assert!(!cache.path().unwrap().exists());
        // Clearing again, with no file left, is fine.
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_reports_undeletable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), DAY);
        cache.update("k", "v".to_string()).await.unwrap();
        let path = cache.path().unwrap().to_path_buf();
        // A directory cannot be removed as a file.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = cache.clear().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Persist(failed) if *failed == path));
        assert!(cache.is_empty());
        assert_eq!(cache.hit("k").await, None);
    }

    #[tokio::test]
    async fn test_purge() {
        let cache = ExpiringCache::<u8>::in_memory("story", Duration::from_millis(100));
        cache.update_at("a".to_string(), 1, 0).await.unwrap();
        cache.update_at("b".to_string(), 2, 50).await.unwrap();
        assert_eq!(cache.purge_at(120).await.unwrap(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_at(120).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_updates_all_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let shared = Arc::new(cache(dir.path(), DAY));
        let tasks = (0..16)
            .map(|n| {
                let cache = Arc::clone(&shared);
                tokio::spawn(async move { cache.update(format!("key-{n}"), n.to_string()).await })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(file_keys(&shared).len(), 16);
    }

    #[tokio::test]
    async fn test_in_memory_never_writes() {
        let cache = ExpiringCache::<u8>::in_memory("story", Duration::from_secs(1));
        cache.update("k", 1).await.unwrap();
        assert_eq!(cache.path(), None);
        assert_eq!(cache.deserialize().await.unwrap(), 0);
        // In-memory caches have nothing to load, so the entry survives.
        assert_eq!(cache.hit("k").await, Some(1));
    }
}
