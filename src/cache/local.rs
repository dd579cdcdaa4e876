//! Local Engine Module
//!
//! In-memory backend: a `CacheStore` behind one `RwLock` per instance, plus
//! the background TTL sweep. Stats are reported while the lock is held so
//! the registry always agrees with the map.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::store::{CacheStore, Lookup, Removal, SetOutcome};
use crate::config::CacheConfig;
use crate::stats::{KeyWrite, StatsReporter};
use crate::tasks::{spawn_sweep_task, sweep_expired};

// == Local Engine ==
#[derive(Debug)]
pub(crate) struct LocalEngine {
    store: Arc<RwLock<CacheStore>>,
    reporter: StatsReporter,
    sweep: Option<JoinHandle<()>>,
}

impl LocalEngine {
    /// Creates the engine and, outside test mode, starts its sweep task.
    ///
    /// Must be called from within a Tokio runtime unless `test_mode` is set.
    pub fn new(config: &CacheConfig, reporter: StatsReporter) -> Self {
        let store = Arc::new(RwLock::new(CacheStore::new(
            config.max_memory_bytes(),
            config.default_ttl(),
        )));

        let sweep = (!config.test_mode).then(|| {
            spawn_sweep_task(store.clone(), reporter.clone(), config.sweep_interval_secs)
        });

        Self {
            store,
            reporter,
            sweep,
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut store = self.store.write().await;

        match store.get(key) {
            Lookup::Hit(value) => {
                self.reporter.hit(key);
                Some(value)
            }
            Lookup::Expired { size_bytes } => {
                self.reporter.expire(key, size_bytes);
                self.reporter.miss(key);
                None
            }
            Lookup::Miss => {
                self.reporter.miss(key);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) {
        let mut store = self.store.write().await;
        let outcome = store.set(key.to_string(), value, ttl_seconds);
        if !outcome.evicted.is_empty() {
            debug!(
                service = self.reporter.service(),
                evicted = outcome.evicted.len(),
                entries = store.len(),
                size_bytes = store.size_bytes(),
                "Memory bound enforced"
            );
        }
        self.report_set(key, outcome);
    }

    fn report_set(&self, key: &str, outcome: SetOutcome) {
        for (expired, size_bytes) in &outcome.expired {
            self.reporter.expire(expired, *size_bytes);
        }

        for (evicted, size_bytes) in &outcome.evicted {
            debug!(
                service = self.reporter.service(),
                key = %evicted,
                size_bytes = size_bytes,
                "Evicted entry under memory pressure"
            );
            self.reporter.evict(evicted, *size_bytes);
        }

        self.reporter.set(
            key,
            KeyWrite {
                size_bytes: outcome.size_bytes,
                previous_size: outcome.previous_size,
                expires_at: outcome.expires_at,
            },
        );
    }

    pub async fn del(&self, key: &str) -> bool {
        let mut store = self.store.write().await;

        match store.delete(key) {
            Removal::Deleted { size_bytes } => {
                self.reporter.delete(key, size_bytes);
                true
            }
            Removal::Expired { size_bytes } => {
                self.reporter.expire(key, size_bytes);
                false
            }
            Removal::Absent => false,
        }
    }

    pub async fn has_key(&self, key: &str) -> bool {
        self.store.read().await.contains(key)
    }

    pub async fn flush(&self) {
        let mut store = self.store.write().await;
        let removed = store.clear();
        self.reporter.flush();
        debug!(
            service = self.reporter.service(),
            removed = removed,
            "Flushed local cache"
        );
    }

    pub async fn keys(&self) -> Vec<String> {
        self.store.read().await.keys()
    }

    pub async fn ttl(&self, key: &str) -> Option<Option<u64>> {
        self.store.read().await.ttl(key)
    }

    pub async fn set_ttl(&self, key: &str, ttl_seconds: u64) -> bool {
        let mut store = self.store.write().await;

        match store.set_ttl(key, ttl_seconds) {
            Some(expires_at) => {
                self.reporter.ttl(key, expires_at);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.keys().len()
    }

    /// Runs one sweep immediately, returning the number of entries reclaimed.
    pub async fn purge_expired(&self) -> usize {
        sweep_expired(&self.store, &self.reporter).await
    }
}

impl Drop for LocalEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep.take() {
            handle.abort();
        }
    }
}
