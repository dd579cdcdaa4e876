//! Cache Service Module
//!
//! The facade callers use. Picks the backend once at construction, encodes
//! values as JSON, and keeps the instance registered with the stats registry
//! for as long as it lives.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::cache::local::LocalEngine;
use crate::cache::remote::RemoteEngine;
use crate::config::{CacheConfig, CacheType};
use crate::error::Result;
use crate::stats::{CacheInstanceStats, KeyStats, Registration, StatsRegistry, StatsReporter};

/// Backend dispatch, fixed at construction.
#[derive(Debug)]
enum CacheBackend {
    Local(LocalEngine),
    /// Boxed to keep the enum small
    Remote(Box<RemoteEngine>),
}

impl CacheBackend {
    fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            Self::Local(engine) => Ok(engine.get(key).await),
            Self::Remote(engine) => engine.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()> {
        match self {
            Self::Local(engine) => {
                engine.set(key, value, ttl_seconds).await;
                Ok(())
            }
            Self::Remote(engine) => engine.set(key, value, ttl_seconds).await,
        }
    }

    async fn del(&self, key: &str) -> Result<bool> {
        match self {
            Self::Local(engine) => Ok(engine.del(key).await),
            Self::Remote(engine) => engine.del(key).await,
        }
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        match self {
            Self::Local(engine) => Ok(engine.has_key(key).await),
            Self::Remote(engine) => engine.has_key(key).await,
        }
    }

    async fn flush(&self) -> Result<()> {
        match self {
            Self::Local(engine) => {
                engine.flush().await;
                Ok(())
            }
            Self::Remote(engine) => engine.flush().await,
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        match self {
            Self::Local(engine) => Ok(engine.keys().await),
            Self::Remote(engine) => engine.keys().await,
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Option<u64>>> {
        match self {
            Self::Local(engine) => Ok(engine.ttl(key).await),
            Self::Remote(engine) => engine.ttl(key).await,
        }
    }

    async fn set_ttl(&self, key: &str, ttl_seconds: u64) -> Result<bool> {
        match self {
            Self::Local(engine) => Ok(engine.set_ttl(key, ttl_seconds).await),
            Self::Remote(engine) => engine.set_ttl(key, ttl_seconds).await,
        }
    }

    async fn len(&self) -> Result<usize> {
        match self {
            Self::Local(engine) => Ok(engine.len().await),
            Self::Remote(engine) => engine.len().await,
        }
    }
}

// == Cache Service ==
/// A named cache instance.
///
/// Share it between tasks with `Arc<CacheService>`. Dropping the last handle
/// stops the background sweep and unregisters the instance.
///
/// # Example
/// ```ignore
/// let registry = StatsRegistry::new();
/// let cache = CacheService::new(CacheConfig::local("users").with_default_ttl(60), &registry).await?;
/// cache.set("user:1", &user, None).await?;
/// let user: Option<User> = cache.get("user:1").await?;
/// ```
pub struct CacheService {
    // Dropped before the registration so the sweep stops first
    backend: CacheBackend,
    reporter: StatsReporter,
    config: CacheConfig,
    _registration: Registration,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("service_identifier", &self.config.service_identifier)
            .field("backend", &self.backend)
            .finish()
    }
}

impl CacheService {
    // == Constructor ==
    /// Validates `config`, connects the backend and registers the instance.
    ///
    /// Nothing is registered if validation or the remote connection fails.
    pub async fn new(config: CacheConfig, registry: &Arc<StatsRegistry>) -> Result<Self> {
        config.validate()?;

        let reporter = StatsReporter::new(
            Arc::clone(registry),
            &config.service_identifier,
            config.notifications_enabled(),
        );

        let remote = match config.cache_type {
            CacheType::Remote => Some(RemoteEngine::connect(&config, reporter.clone()).await?),
            CacheType::Local => None,
        };

        let registration =
            Registration::new(registry, &config.service_identifier, config.track_key_stats);

        let backend = match remote {
            Some(engine) => CacheBackend::Remote(Box::new(engine)),
            None => CacheBackend::Local(LocalEngine::new(&config, reporter.clone())),
        };

        info!(
            service = %config.service_identifier,
            backend = backend.name(),
            default_ttl = config.default_ttl_seconds,
            max_memory_mb = ?config.max_memory_size_mb,
            test_mode = config.test_mode,
            "Cache instance created"
        );

        Ok(Self {
            backend,
            reporter,
            config,
            _registration: registration,
        })
    }

    // == Get ==
    /// Returns the live value for `key`, or `None` if it was never set,
    /// deleted or expired. Counts a hit or a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // == Set ==
    /// Stores `value` under `key`.
    ///
    /// `ttl_seconds` overrides the instance default; `Some(0)` stores without
    /// expiry. A value that cannot be serialized is rejected before anything
    /// is written or counted.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        self.backend.set(key, encoded, ttl_seconds).await
    }

    // == Delete ==
    /// Removes `key`. Returns whether a live entry was removed.
    pub async fn del(&self, key: &str) -> Result<bool> {
        self.backend.del(key).await
    }

    // == Has Key ==
    /// True if `get` would return a value. Counts neither hit nor miss.
    pub async fn has_key(&self, key: &str) -> Result<bool> {
        self.backend.has_key(key).await
    }

    // == Flush ==
    /// Removes every entry of this instance and zeroes its gauges. Lifetime
    /// counters are kept.
    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await
    }

    // == Stats ==
    /// Point-in-time copy of this identifier's aggregate stats.
    pub fn get_stats(&self) -> CacheInstanceStats {
        self.reporter
            .registry()
            .get_service_stats(self.service_identifier())
            .unwrap_or_default()
    }

    /// Per-key stats, or `None` when key tracking is disabled.
    pub fn get_key_stats(&self) -> Option<HashMap<String, KeyStats>> {
        self.reporter
            .registry()
            .get_key_stats(self.service_identifier())
    }

    // == Keys ==
    /// Live keys of this instance.
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.backend.keys().await
    }

    /// Number of live keys.
    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    // == TTL ==
    /// Remaining TTL in seconds: `None` if absent, `Some(None)` if it never expires.
    pub async fn ttl(&self, key: &str) -> Result<Option<Option<u64>>> {
        self.backend.ttl(key).await
    }

    /// Changes the expiry of a live key without rewriting it; `0` persists it.
    /// Returns whether the key was live.
    pub async fn set_ttl(&self, key: &str, ttl_seconds: u64) -> Result<bool> {
        self.backend.set_ttl(key, ttl_seconds).await
    }

    /// Reclaims expired entries now instead of waiting for the sweep.
    /// Always 0 for the remote backend, where Redis expires keys itself.
    pub async fn purge_expired(&self) -> usize {
        match &self.backend {
            CacheBackend::Local(engine) => engine.purge_expired().await,
            CacheBackend::Remote(_) => 0,
        }
    }

    pub fn service_identifier(&self) -> &str {
        &self.config.service_identifier
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<StatsRegistry> {
        self.reporter.registry()
    }
}

impl Drop for CacheService {
    fn drop(&mut self) {
        info!(
            service = %self.config.service_identifier,
            backend = self.backend.name(),
            "Cache instance disposed"
        );
    }
}
