//! Configuration Module
//!
//! Construction options for a cache instance. Loading these from files or the
//! environment is left to the host application; the struct deserializes with
//! serde so any format works.

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Bytes per configured megabyte.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Storage strategy selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// In-process memory store
    #[default]
    Local,
    /// Shared Redis store
    Remote,
}

/// Connection options for the remote backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteOptions {
    /// Redis connection URL, e.g. `redis://localhost:6379/0`
    pub url: String,
    /// Namespace prepended to every key. Defaults to `"{service_identifier}:"`.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

/// Cache instance configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name under which stats are aggregated in the registry
    pub service_identifier: String,
    /// Backend selection
    pub cache_type: CacheType,
    /// Default TTL in seconds for writes without an explicit TTL, 0 = never expires
    pub default_ttl_seconds: u64,
    /// Memory bound for the local backend in megabytes
    pub max_memory_size_mb: Option<u64>,
    /// Interval in seconds between background TTL sweeps (local backend)
    pub sweep_interval_secs: u64,
    /// Remote connection options, required when `cache_type` is remote
    pub remote: Option<RemoteOptions>,
    /// Disables background timers and change notifications
    pub test_mode: bool,
    /// Publishes change notifications for this instance through the registry
    pub enable_monitoring: bool,
    /// Keeps per-key stats in the registry
    pub track_key_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            service_identifier: "default".to_string(),
            cache_type: CacheType::Local,
            default_ttl_seconds: 0,
            max_memory_size_mb: None,
            sweep_interval_secs: 1,
            remote: None,
            test_mode: false,
            enable_monitoring: false,
            track_key_stats: true,
        }
    }
}

impl CacheConfig {
    /// Local in-memory cache registered under `service_identifier`.
    pub fn local(service_identifier: impl Into<String>) -> Self {
        Self {
            service_identifier: service_identifier.into(),
            ..Self::default()
        }
    }

    /// Redis-backed cache registered under `service_identifier`.
    pub fn remote(service_identifier: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            service_identifier: service_identifier.into(),
            cache_type: CacheType::Remote,
            remote: Some(RemoteOptions {
                url: url.into(),
                key_prefix: None,
            }),
            ..Self::default()
        }
    }

    pub fn with_default_ttl(mut self, seconds: u64) -> Self {
        self.default_ttl_seconds = seconds;
        self
    }

    pub fn with_max_memory_mb(mut self, megabytes: u64) -> Self {
        self.max_memory_size_mb = Some(megabytes);
        self
    }

    pub fn with_sweep_interval(mut self, seconds: u64) -> Self {
        self.sweep_interval_secs = seconds;
        self
    }

    pub fn with_test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.enable_monitoring = enabled;
        self
    }

    pub fn with_key_stats(mut self, enabled: bool) -> Self {
        self.track_key_stats = enabled;
        self
    }

    /// Memory bound in bytes, if any.
    pub fn max_memory_bytes(&self) -> Option<u64> {
        self.max_memory_size_mb.map(|mb| mb * BYTES_PER_MB)
    }

    /// TTL applied when a write does not carry its own, `None` = never expires.
    pub fn default_ttl(&self) -> Option<u64> {
        (self.default_ttl_seconds > 0).then_some(self.default_ttl_seconds)
    }

    /// True when this instance should publish change notifications.
    pub fn notifications_enabled(&self) -> bool {
        self.enable_monitoring && !self.test_mode
    }

    /// Key namespace used by the remote backend.
    pub fn remote_key_prefix(&self) -> String {
        self.remote
            .as_ref()
            .and_then(|remote| remote.key_prefix.clone())
            .unwrap_or_else(|| format!("{}:", self.service_identifier))
    }

    // == Validate ==
    /// Checks the options before anything is registered or connected.
    pub fn validate(&self) -> Result<()> {
        if self.service_identifier.trim().is_empty() {
            return Err(CacheError::Configuration(
                "service_identifier cannot be empty".to_string(),
            ));
        }

        match self.cache_type {
            CacheType::Local => {
                if self.max_memory_size_mb == Some(0) {
                    return Err(CacheError::Configuration(
                        "max_memory_size_mb must be greater than zero".to_string(),
                    ));
                }
                if !self.test_mode && self.sweep_interval_secs == 0 {
                    return Err(CacheError::Configuration(
                        "sweep_interval_secs must be greater than zero".to_string(),
                    ));
                }
            }
            CacheType::Remote => match &self.remote {
                None => {
                    return Err(CacheError::Configuration(
                        "remote cache requires connection options".to_string(),
                    ))
                }
                Some(remote) if remote.url.trim().is_empty() => {
                    return Err(CacheError::Configuration(
                        "remote connection url cannot be empty".to_string(),
                    ))
                }
                Some(_) => {}
            },
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.service_identifier, "default");
        assert_eq!(config.cache_type, CacheType::Local);
        assert_eq!(config.default_ttl_seconds, 0);
        assert_eq!(config.sweep_interval_secs, 1);
        assert!(config.track_key_stats);
        assert!(config.default_ttl().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_memory_bytes() {
        let config = CacheConfig::local("svc").with_max_memory_mb(2);
        assert_eq!(config.max_memory_bytes(), Some(2 * 1024 * 1024));
    }

    #[test]
    fn test_remote_without_connection_info_rejected() {
        let config = CacheConfig {
            cache_type: CacheType::Remote,
            ..CacheConfig::local("svc")
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::Configuration(_))
        ));
    }

    #[test]
    fn test_remote_empty_url_rejected() {
        let config = CacheConfig::remote("svc", "  ");
        assert!(matches!(
            config.validate(),
            Err(CacheError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_memory_rejected() {
        let config = CacheConfig::local("svc").with_max_memory_mb(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_sweep_interval_allowed_in_test_mode() {
        let config = CacheConfig::local("svc").with_sweep_interval(0);
        assert!(config.validate().is_err());
        assert!(config.with_test_mode(true).validate().is_ok());
    }

    #[test]
    fn test_remote_key_prefix_defaults_to_identifier() {
        let config = CacheConfig::remote("orders", "redis://localhost:6379");
        assert_eq!(config.remote_key_prefix(), "orders:");
    }

    #[test]
    fn test_notifications_disabled_in_test_mode() {
        let config = CacheConfig::local("svc").with_monitoring(true);
        assert!(config.notifications_enabled());
        assert!(!config.with_test_mode(true).notifications_enabled());
    }

    #[test]
    fn test_config_deserialize() {
        let json = r#"{
            "service_identifier": "users",
            "cache_type": "remote",
            "default_ttl_seconds": 30,
            "remote": { "url": "redis://cache:6379" }
        }"#;
        let config: CacheConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.cache_type, CacheType::Remote);
        assert_eq!(config.default_ttl(), Some(30));
        assert!(config.track_key_stats);
        assert!(config.validate().is_ok());
    }
}
