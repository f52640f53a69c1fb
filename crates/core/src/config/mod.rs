//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STASHWAY_*)
//! 2. TOML config file (if STASHWAY_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded value is the single construction input of the worker: store
//! name pair, version tag, precache list, routing patterns, and eviction
//! constants all live here so independent worker instances can be built
//! side by side with different configs.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Offline cache worker configuration.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STASHWAY_*)
/// 2. TOML config file (if STASHWAY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Path to the SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base name shared by all cache stores of this application.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag embedded in store names; bumping it discards every
    /// store created under the previous tag at activation.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// The site's own origin, e.g. `https://example.com`.
    ///
    /// Same-origin requests default to the cache-first strategy.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Ordered list of critical asset paths cached verbatim at install.
    #[serde(default = "default_precache_assets")]
    pub precache_assets: Vec<String>,

    /// Path of the home/landing document used as the HTML fallback.
    #[serde(default = "default_home_document")]
    pub home_document: String,

    /// Regex fragments matched against full request URLs; a match means
    /// network-first, excluded from every cache store.
    #[serde(default = "default_network_first_patterns")]
    pub network_first_patterns: Vec<String>,

    /// File extensions that qualify a response for the dynamic store.
    #[serde(default = "default_cacheable_extensions")]
    pub cacheable_extensions: Vec<String>,

    /// Dynamic store entry ceiling; crossing it triggers eviction.
    #[serde(default = "default_dynamic_ceiling")]
    pub dynamic_ceiling: u64,

    /// Number of earliest-inserted entries removed per eviction pass.
    #[serde(default = "default_evict_batch")]
    pub evict_batch: u64,

    /// Minimum seconds between opportunistic maintenance passes.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// User-Agent string for outgoing requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted per fetched response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./stashway-cache.sqlite")
}

fn default_cache_prefix() -> String {
    "stashway".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_precache_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/css/styles.css",
        "/js/app.js",
        "/js/search.js",
        "/img/logo.svg",
        "/manifest.webmanifest",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_home_document() -> String {
    "/index.html".into()
}

fn default_network_first_patterns() -> Vec<String> {
    [r"googleapis\.com", r"gstatic\.com", r"firebaseio\.com", r"/api/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cacheable_extensions() -> Vec<String> {
    ["html", "css", "js", "png", "jpg", "jpeg", "svg", "webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_dynamic_ceiling() -> u64 {
    50
}

fn default_evict_batch() -> u64 {
    10
}

fn default_cleanup_interval_secs() -> u64 {
    86_400
}

fn default_user_agent() -> String {
    "stashway/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            precache_assets: default_precache_assets(),
            home_document: default_home_document(),
            network_first_patterns: default_network_first_patterns(),
            cacheable_extensions: default_cacheable_extensions(),
            dynamic_ceiling: default_dynamic_ceiling(),
            evict_batch: default_evict_batch(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl WorkerConfig {
    /// Name of the static store under the current version tag.
    pub fn static_store_name(&self) -> String {
        format!("{}-{}-static", self.cache_prefix, self.cache_version)
    }

    /// Name of the dynamic store under the current version tag.
    pub fn dynamic_store_name(&self) -> String {
        format!("{}-{}-dynamic", self.cache_prefix, self.cache_version)
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Throttle interval for opportunistic maintenance.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STASHWAY_`
    /// 2. TOML file from `STASHWAY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or parsed, or if
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STASHWAY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STASHWAY_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
