use crate::error::{ErrorKind, Result};
use crate::progress::Progress;
use crate::site::Site;
use exn::ResultExt;
use fray_cache::ExpiringCache;
use fray_config::Config;
use fray_events::ChangeBus;
use fray_fetch::{ConnectivityGate, HttpTransport, PatientFetcher, RateLimiter, Signals, TcpProbe};
use fray_storage::ChapterStore;
use fray_storage::backend::LocalBackend;
use fray_store::{Database, StoryStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Name of the cache holding story chapter pages.
pub const PAGE_CACHE: &str = "Story";
/// Name of the cache holding canon, category and review pages.
pub const LISTING_CACHE: &str = "Category";

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Everything the pipeline works with. Built once at startup and handed to
/// whatever needs it; nothing reaches for shared state on its own.
#[derive(Clone)]
pub struct Context {
    pub fetcher: PatientFetcher,
    pub site: Site,
    /// Story chapter pages, keyed `<id>-<chapter>`.
    pub pages: Arc<ExpiringCache<String>>,
    /// Listing pages, keyed by path and page.
    pub listings: Arc<ExpiringCache<String>>,
    pub store: StoryStore,
    pub chapters: ChapterStore,
    pub progress: Arc<dyn Progress>,
    /// Chapters buffered between fetching and writing.
    pub channel_capacity: usize,
}

impl Context {
    /// Wire up the production collaborators: HTTP, a TCP connectivity probe,
    /// the on-disk caches, the SQLite database and the local chapter
    /// directory.
    #[instrument(skip_all)]
    pub async fn from_config(config: &Config, signals: Arc<dyn Signals>, progress: Arc<dyn Progress>) -> Result<Self> {
        let site = Site::new(&config.network.base_url)?;
        let transport = HttpTransport::new(&config.network.user_agent, config.request_timeout()).map_err(ErrorKind::fetch)?;
        let probe = TcpProbe::new(config.network.probe_address.clone(), PROBE_TIMEOUT);
        let gate = ConnectivityGate::new(Arc::new(probe), config.connectivity_poll());
        let limiter = Arc::new(RateLimiter::new(config.rate_limit()));
        let fetcher = PatientFetcher::new(gate, limiter, Arc::new(transport), signals);

        let pages = load_cache(PAGE_CACHE, &config.cache.directory, config.story_ttl()).await;
        let listings = load_cache(LISTING_CACHE, &config.cache.directory, config.listing_ttl()).await;

        if let Some(parent) = config.library.database.parent() {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Store)?;
        }
        let db = Database::connect(&config.library.database).await.or_raise(|| ErrorKind::Store)?;
        let store = StoryStore::new(&db, ChangeBus::spawn());
        let backend = LocalBackend::new("chapters", &config.library.directory).or_raise(|| ErrorKind::Storage)?;
        let chapters = ChapterStore::new(Arc::new(backend), config.compression());

        Ok(Self {
            fetcher,
            site,
            pages,
            listings,
            store,
            chapters,
            progress,
            channel_capacity: config.library.channel_capacity,
        })
    }
}

/// A cache that cannot be loaded starts empty rather than failing startup.
async fn load_cache(name: &str, directory: &Path, ttl: Duration) -> Arc<ExpiringCache<String>> {
    let cache = ExpiringCache::new(name, directory, ttl);
    match cache.deserialize().await {
        Ok(entries) => tracing::debug!(cache = name, entries, "cache loaded"),
        Err(err) => tracing::warn!(cache = name, error = ?err, "cache not loaded, starting empty"),
    }
    Arc::new(cache)
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("site", &self.site)
            .field("pages", &self.pages)
            .field("listings", &self.listings)
            .field("chapters", &self.chapters)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::TracingProgress;
    use fray_fetch::TracingSignals;

    fn config(root: &Path) -> Config {
        let mut config = Config::default();
        config.cache.directory = root.join("cache");
        config.library.directory = root.join("chapters");
        config.library.database = root.join("data").join("library.sqlite");
        config
    }

    #[tokio::test]
    async fn test_from_config_creates_library() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let ctx = Context::from_config(&config, Arc::new(TracingSignals), Arc::new(TracingProgress)).await.unwrap();

        assert!(config.library.database.is_file());
        assert!(config.library.directory.is_dir());
        assert_eq!(ctx.pages.name(), PAGE_CACHE);
        assert_eq!(ctx.pages.ttl(), Duration::from_secs(24 * 3_600));
        assert_eq!(ctx.listings.ttl(), Duration::from_secs(7 * 24 * 3_600));
        assert_eq!(ctx.channel_capacity, 10);
        assert_eq!(ctx.site.base().as_str(), "https://www.fanfiction.net/");
    }

    #[tokio::test]
    async fn test_from_config_rejects_bad_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.network.base_url = "nope".to_string();
        let err = Context::from_config(&config, Arc::new(TracingSignals), Arc::new(TracingProgress))
            .await
            .unwrap_err();
        assert_eq!(*err, ErrorKind::Url("nope".to_string()));
    }
}
