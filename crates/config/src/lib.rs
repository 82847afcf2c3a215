//! Layered configuration.
//!
//! Lowest to highest precedence: built-in defaults, a config file
//! (`config.toml`, `config.yaml` or `config.json` in the platform config
//! directory, or one path given explicitly), then `FRAY_`-prefixed
//! environment variables with `__` separating sections from keys, e.g.
//! `FRAY_NETWORK__RATE_LIMIT_MS=500`.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use fray_compress::Compression;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "FRAY_";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "fray", "fray")
}

/// Used when the platform offers no home directory to derive paths from.
fn fallback_dir() -> PathBuf {
    std::env::temp_dir().join("fray")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub cache: CacheConfig,
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Wait before every request, shared by all requests in the process.
    pub rate_limit_ms: u64,
    /// How often to re-check connectivity while offline.
    pub connectivity_poll_ms: u64,
    /// `host:port` that must accept a TCP connection for the network to
    /// count as usable.
    pub probe_address: String,
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.fanfiction.net".to_string(),
            user_agent: concat!("fray/", env!("CARGO_PKG_VERSION")).to_string(),
            rate_limit_ms: 300,
            connectivity_poll_ms: 500,
            probe_address: "www.fanfiction.net:443".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub directory: PathBuf,
    /// Lifetime of cached chapter pages.
    pub story_ttl_hours: u64,
    /// Lifetime of cached canon, category and review listings.
    pub listing_ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: project_dirs().map_or_else(|| fallback_dir().join("cache"), |dirs| dirs.cache_dir().to_path_buf()),
            story_ttl_hours: 24,
            listing_ttl_hours: 7 * 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root of the materialized chapters.
    pub directory: PathBuf,
    /// SQLite database file.
    pub database: PathBuf,
    /// Format new chapters are written in: none, deflate, gzip or bzip2.
    pub compression: String,
    /// Chapters buffered between fetching and writing.
    pub channel_capacity: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let data = project_dirs().map_or_else(fallback_dir, |dirs| dirs.data_dir().to_path_buf());
        Self {
            directory: data.join("chapters"),
            database: data.join("library.sqlite"),
            compression: Compression::default().to_string(),
            channel_capacity: 10,
        }
    }
}

impl Config {
    /// Load and validate configuration. With `explicit`, that file replaces
    /// the platform config directory lookup and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(explicit)?
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus file layers; environment variables are left to the caller.
    fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            tracing::debug!(path = %path.display(), "loading config file");
            return match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => Ok(figment.merge(Toml::file_exact(path))),
                Some("yaml" | "yml") => Ok(figment.merge(Yaml::file_exact(path))),
                Some("json") => Ok(figment.merge(Json::file_exact(path))),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        let Some(dirs) = project_dirs() else {
            return Ok(figment);
        };
        let dir = dirs.config_dir();
        // Missing files are skipped by figment.
        Ok(figment
            .merge(Toml::file(dir.join("config.toml")))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Json::file(dir.join("config.json"))))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field, reason| ErrorKind::Invalid { field, reason };
        if self.network.rate_limit_ms == 0 {
            exn::bail!(invalid("network.rate_limit_ms", "must be greater than zero"));
        }
        if self.network.connectivity_poll_ms == 0 {
            exn::bail!(invalid("network.connectivity_poll_ms", "must be greater than zero"));
        }
        if self.network.request_timeout_secs == 0 {
            exn::bail!(invalid("network.request_timeout_secs", "must be greater than zero"));
        }
        if self.cache.story_ttl_hours == 0 || self.cache.listing_ttl_hours == 0 {
            exn::bail!(invalid("cache", "cache lifetimes must be greater than zero"));
        }
        if self.library.channel_capacity == 0 {
            exn::bail!(invalid("library.channel_capacity", "must be greater than zero"));
        }
        if !self.library.directory.is_absolute() {
            exn::bail!(invalid("library.directory", "must be an absolute path"));
        }
        self.library.compression.parse::<Compression>().or_raise(|| invalid("library.compression", "unknown format"))?;
        Ok(())
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.network.rate_limit_ms)
    }

    pub fn connectivity_poll(&self) -> Duration {
        Duration::from_millis(self.network.connectivity_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }

    pub fn story_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.story_ttl_hours * 60 * 60)
    }

    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.listing_ttl_hours * 60 * 60)
    }

    /// The configured chapter format. Falls back to the default for a value
    /// [`validate`](Self::validate) would have rejected.
    pub fn compression(&self) -> Compression {
        self.library.compression.parse().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn with_file(extension: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("config.{extension}"));
        std::fs::File::create(&path).unwrap().write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    fn extract(path: &Path) -> Result<Config> {
        let config: Config = Config::figment(Some(path))?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.rate_limit(), Duration::from_millis(300));
        assert_eq!(config.listing_ttl(), Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.compression(), Compression::Gzip);
        assert_eq!(config.library.channel_capacity, 10);
    }

    #[rstest]
    #[case("toml", "[network]\nrate_limit_ms = 750\n\n[library]\ncompression = \"bzip2\"\n")]
    #[case("yaml", "network:\n  rate_limit_ms: 750\nlibrary:\n  compression: bzip2\n")]
    #[case("json", r#"{"network": {"rate_limit_ms": 750}, "library": {"compression": "bzip2"}}"#)]
    fn test_file_overrides_defaults(#[case] extension: &str, #[case] contents: &str) {
        let (_dir, path) = with_file(extension, contents);
        let config = extract(&path).unwrap();
        assert_eq!(config.network.rate_limit_ms, 750);
        assert_eq!(config.compression(), Compression::Bzip2);
        // Untouched keys keep their defaults.
        assert_eq!(config.network.connectivity_poll_ms, 500);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[rstest]
    #[case("[network]\nrate_limit_ms = 0\n", "network.rate_limit_ms")]
    #[case("[library]\nchannel_capacity = 0\n", "library.channel_capacity")]
    #[case("[library]\ncompression = \"zstd\"\n", "library.compression")]
    #[case("[library]\ndirectory = \"relative/chapters\"\n", "library.directory")]
    #[case("[cache]\nlisting_ttl_hours = 0\n", "cache")]
    fn test_invalid_values(#[case] contents: &str, #[case] expected: &str) {
        let (_dir, path) = with_file("toml", contents);
        let err = extract(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field, .. } if *field == expected));
    }

    #[test]
    fn test_wrong_type_fails_to_load() {
        let (_dir, path) = with_file("toml", "[network]\nrate_limit_ms = \"fast\"\n");
        assert_eq!(*extract(&path).unwrap_err(), ErrorKind::Load);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let (_dir, path) = with_file("ini", "rate_limit_ms=1");
        let err = Config::figment(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }
}
