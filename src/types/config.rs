//! Configuration structures.
//!
//! Configuration is loaded from environment variables with serde defaults
//! for everything not provided.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Error, Result};

/// Global bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backing PSA API configuration.
    #[serde(default)]
    pub api: ApiConfig,

    /// Name-resolution cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Backing PSA API configuration.
///
/// The credential fields form the default (single-tenant) identity; tool
/// calls may override them per request with an explicit tenant context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST API base URL.
    pub base_url: String,

    /// API principal name.
    pub username: String,

    /// API secret. Never logged, never part of cache partitioning.
    pub secret: String,

    /// Vendor integration code identifying this client application.
    pub integration_code: String,

    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Page size cap for query calls.
    pub max_records: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com/v1".to_string(),
            username: String::new(),
            secret: String::new(),
            integration_code: String::new(),
            request_timeout: Duration::from_secs(30),
            max_records: 500,
        }
    }
}

/// Name-resolution cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Hard cap on concurrently held tenant partitions. Exceeding it
    /// evicts the least-recently-accessed partition.
    pub max_tenants: usize,

    /// Freshness window: a populated table older than this is refreshed
    /// on next touch, and a partition idle longer than this is purged
    /// by the sweep.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// How often the background sweep scans for idle partitions.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Bound on concurrent backing-API fetches during batched resolution.
    pub max_concurrent_fetches: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_tenants: 50,
            refresh_interval: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            max_concurrent_fetches: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from `PSA_*` environment variables, falling back
    /// to defaults for anything unset.
    ///
    /// Returns an error only for values that are present but unparseable —
    /// a missing variable is never fatal here (credential completeness is
    /// checked where the API client is constructed).
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(v) = read_env("PSA_API_BASE_URL") {
            config.api.base_url = v;
        }
        if let Some(v) = read_env("PSA_API_USERNAME") {
            config.api.username = v;
        }
        if let Some(v) = read_env("PSA_API_SECRET") {
            config.api.secret = v;
        }
        if let Some(v) = read_env("PSA_API_INTEGRATION_CODE") {
            config.api.integration_code = v;
        }
        if let Some(v) = read_env("PSA_API_TIMEOUT_SECS") {
            config.api.request_timeout = Duration::from_secs(parse_env("PSA_API_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = read_env("PSA_API_MAX_RECORDS") {
            config.api.max_records = parse_env("PSA_API_MAX_RECORDS", &v)?;
        }

        if let Some(v) = read_env("PSA_CACHE_MAX_TENANTS") {
            config.cache.max_tenants = parse_env("PSA_CACHE_MAX_TENANTS", &v)?;
        }
        if let Some(v) = read_env("PSA_CACHE_REFRESH_SECS") {
            config.cache.refresh_interval =
                Duration::from_secs(parse_env("PSA_CACHE_REFRESH_SECS", &v)?);
        }
        if let Some(v) = read_env("PSA_CACHE_SWEEP_SECS") {
            config.cache.sweep_interval =
                Duration::from_secs(parse_env("PSA_CACHE_SWEEP_SECS", &v)?);
        }
        if let Some(v) = read_env("PSA_CACHE_MAX_CONCURRENT_FETCHES") {
            config.cache.max_concurrent_fetches =
                parse_env("PSA_CACHE_MAX_CONCURRENT_FETCHES", &v)?;
        }

        if let Some(v) = read_env("PSA_LOG_LEVEL") {
            config.observability.log_level = v;
        }
        if let Some(v) = read_env("PSA_LOG_FORMAT") {
            config.observability.json_logs = v.eq_ignore_ascii_case("json");
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly work.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_tenants == 0 {
            return Err(Error::config("cache.max_tenants must be at least 1"));
        }
        if self.cache.max_concurrent_fetches == 0 {
            return Err(Error::config(
                "cache.max_concurrent_fetches must be at least 1",
            ));
        }
        if self.api.base_url.is_empty() {
            return Err(Error::config("api.base_url cannot be empty"));
        }
        Ok(())
    }

    /// True when the default credential triple is fully populated.
    pub fn has_default_credentials(&self) -> bool {
        !self.api.username.is_empty()
            && !self.api.secret.is_empty()
            && !self.api.integration_code.is_empty()
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(format!("invalid value for {}: {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.max_tenants, 50);
        assert_eq!(config.cache.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.api.max_records, 500);
        assert!(!config.has_default_credentials());
    }

    #[test]
    fn test_validate_rejects_zero_tenants() {
        let mut config = Config::default();
        config.cache.max_tenants = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_base_url() {
        let mut config = Config::default();
        config.api.base_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        let result: Result<u64> = parse_env("PSA_CACHE_MAX_TENANTS", "lots");
        assert!(result.is_err());
    }

    #[test]
    fn test_has_default_credentials() {
        let mut config = Config::default();
        config.api.username = "svc@example.com".to_string();
        config.api.secret = "s3cret".to_string();
        assert!(!config.has_default_credentials());
        config.api.integration_code = "ABC123".to_string();
        assert!(config.has_default_credentials());
    }
}
