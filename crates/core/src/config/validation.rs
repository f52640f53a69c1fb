//! Configuration validation rules.
//!
//! This module provides validation logic for `WorkerConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::WorkerConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_prefix` or `cache_version` is empty
    /// - `dynamic_ceiling` is 0 or `evict_batch` is 0 or exceeds the ceiling
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `origin` is not an http(s) URL
    /// - an asset path does not start with `/`
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }
        if self.cache_version.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }

        if self.dynamic_ceiling == 0 {
            return Err(ConfigError::Invalid { field: "dynamic_ceiling".into(), reason: "must be greater than 0".into() });
        }
        if self.evict_batch == 0 || self.evict_batch > self.dynamic_ceiling {
            return Err(ConfigError::Invalid {
                field: "evict_batch".into(),
                reason: "must be between 1 and dynamic_ceiling".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if !self.origin.starts_with("http://") && !self.origin.starts_with("https://") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL".into() });
        }

        for path in self.precache_assets.iter().chain(std::iter::once(&self.home_document)) {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field: "precache_assets".into(),
                    reason: format!("asset path {path:?} must start with '/'"),
                });
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.precache_assets.contains(&self.home_document) {
            tracing::warn!(
                home_document = %self.home_document,
                "home_document is not in precache_assets; the HTML fallback \
                 will only work once the document has been cached dynamically"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_prefix() {
        let config = WorkerConfig { cache_prefix: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_prefix"));
    }

    #[test]
    fn test_validate_zero_ceiling() {
        let config = WorkerConfig { dynamic_ceiling: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "dynamic_ceiling"));
    }

    #[test]
    fn test_validate_evict_batch_exceeds_ceiling() {
        let config = WorkerConfig { dynamic_ceiling: 5, evict_batch: 6, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "evict_batch"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = WorkerConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = WorkerConfig { origin: "ftp://example.com".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_relative_asset_path() {
        let config = WorkerConfig { precache_assets: vec!["css/styles.css".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "precache_assets"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = WorkerConfig {
            dynamic_ceiling: 1,
            evict_batch: 1,
            timeout_ms: 100,
            max_bytes: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
