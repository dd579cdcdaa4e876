//! Stats Registry Module
//!
//! Process-wide aggregator of per-service and per-key metrics. Every cache
//! instance registers here on construction and reports each mutation before
//! the mutating call returns. All methods are plain in-memory map updates.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use super::model::{CacheInstanceStats, KeyRecord, KeyStats};
use crate::cache::current_timestamp_ms;

/// Buffered change notifications per subscriber before lagging.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

static GLOBAL_REGISTRY: OnceLock<Arc<StatsRegistry>> = OnceLock::new();

// == Events ==
/// Kind of mutation that produced a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsEventKind {
    Set,
    Delete,
    Evict,
    Expire,
    Flush,
    Ttl,
}

/// Change notification for monitoring consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsEvent {
    pub service_identifier: String,
    pub kind: StatsEventKind,
    /// Affected key, `None` for flushes
    pub key: Option<String>,
}

/// Outcome of a write, as seen by the registry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyWrite {
    pub size_bytes: u64,
    /// Size of the live value that was replaced, `None` if the key is new
    pub previous_size: Option<u64>,
    pub expires_at: Option<u64>,
}

#[derive(Debug, Default)]
struct ServiceRecord {
    stats: CacheInstanceStats,
    keys: HashMap<String, KeyRecord>,
    /// Live instances sharing this identifier
    instances: usize,
    /// Instances that opted into per-key stats
    key_trackers: usize,
}

impl ServiceRecord {
    fn tracks_keys(&self) -> bool {
        self.key_trackers > 0
    }

    /// One copy of `key` is gone. Its key stats survive while another
    /// instance sharing the service still holds it.
    fn release(&mut self, key: &str, size_bytes: u64) {
        self.stats.keys = self.stats.keys.saturating_sub(1);
        self.stats.size_bytes = self.stats.size_bytes.saturating_sub(size_bytes);
        if let Some(key_record) = self.keys.get_mut(key) {
            key_record.holders = key_record.holders.saturating_sub(1);
            if key_record.holders == 0 {
                self.keys.remove(key);
            }
        }
    }
}

// == Stats Registry ==
/// Aggregates stats for every live cache instance.
///
/// Instances sharing a service identifier merge into one aggregate. Shut the
/// registry down to stop every background sweep started against it.
#[derive(Debug)]
pub struct StatsRegistry {
    services: RwLock<HashMap<String, ServiceRecord>>,
    events: broadcast::Sender<StatsEvent>,
    shutdown: watch::Sender<bool>,
}

impl StatsRegistry {
    // == Constructor ==
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            services: RwLock::new(HashMap::new()),
            events,
            shutdown,
        })
    }

    /// Process-wide registry, created on first use.
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY.get_or_init(Self::new).clone()
    }

    // == Registration ==
    pub(crate) fn register(self: &Arc<Self>, service: &str, track_keys: bool) {
        let mut services = self.services.write();
        let record = services.entry(service.to_string()).or_default();
        record.instances += 1;
        if track_keys {
            record.key_trackers += 1;
        }
        info!(
            service = service,
            instances = record.instances,
            "Cache instance registered"
        );
    }

    pub(crate) fn unregister(&self, service: &str, track_keys: bool) {
        let mut services = self.services.write();
        let Some(record) = services.get_mut(service) else {
            return;
        };

        record.instances = record.instances.saturating_sub(1);
        if track_keys {
            record.key_trackers = record.key_trackers.saturating_sub(1);
            if record.key_trackers == 0 {
                record.keys.clear();
            }
        }

        if record.instances == 0 {
            services.remove(service);
            info!(service = service, "Last cache instance unregistered");
        }
    }

    // == Snapshots ==
    /// Snapshot of every registered service's stats.
    pub fn get_all_stats(&self) -> HashMap<String, CacheInstanceStats> {
        self.services
            .read()
            .iter()
            .map(|(service, record)| (service.clone(), record.stats.clone()))
            .collect()
    }

    /// Snapshot of per-key stats for every service that tracks them.
    pub fn get_key_stats_registry(&self) -> HashMap<String, HashMap<String, KeyStats>> {
        self.services
            .read()
            .iter()
            .filter(|(_, record)| record.tracks_keys())
            .map(|(service, record)| (service.clone(), snapshot_keys(record)))
            .collect()
    }

    pub fn get_service_stats(&self, service: &str) -> Option<CacheInstanceStats> {
        self.services
            .read()
            .get(service)
            .map(|record| record.stats.clone())
    }

    /// Per-key stats for one service, `None` if key tracking is off or the
    /// service is not registered.
    pub fn get_key_stats(&self, service: &str) -> Option<HashMap<String, KeyStats>> {
        self.services
            .read()
            .get(service)
            .filter(|record| record.tracks_keys())
            .map(snapshot_keys)
    }

    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.services.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    // == Notifications ==
    /// Subscribes to change notifications from monitored instances.
    pub fn subscribe(&self) -> broadcast::Receiver<StatsEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: StatsEvent) {
        // No receivers is the normal case when nothing is monitoring.
        let _ = self.events.send(event);
    }

    // == Shutdown ==
    /// Stops every background sweep started against this registry.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        info!("Stats registry shut down, background sweeps stopping");
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    // == Recording ==
    fn with_service(&self, service: &str, update: impl FnOnce(&mut ServiceRecord)) {
        let mut services = self.services.write();
        match services.get_mut(service) {
            Some(record) => update(record),
            None => debug!(service = service, "Stats update for unregistered service dropped"),
        }
    }

    pub(crate) fn record_hit(&self, service: &str, key: &str) {
        self.with_service(service, |record| {
            record.stats.hits += 1;
            if let Some(key_record) = record.keys.get_mut(key) {
                key_record.hits += 1;
                key_record.last_accessed_at = current_timestamp_ms();
            }
        });
    }

    pub(crate) fn record_miss(&self, service: &str, key: &str) {
        self.with_service(service, |record| {
            record.stats.misses += 1;
            if let Some(key_record) = record.keys.get_mut(key) {
                key_record.misses += 1;
            }
        });
    }

    pub(crate) fn record_set(&self, service: &str, key: &str, write: KeyWrite) {
        self.with_service(service, |record| {
            match write.previous_size {
                Some(previous) => {
                    record.stats.size_bytes =
                        record.stats.size_bytes.saturating_sub(previous) + write.size_bytes;
                }
                None => {
                    record.stats.keys_added += 1;
                    record.stats.keys += 1;
                    record.stats.size_bytes += write.size_bytes;
                }
            }

            if record.tracks_keys() {
                let key_record = record.keys.entry(key.to_string()).or_default();
                key_record.holders = match write.previous_size {
                    Some(_) => key_record.holders.max(1),
                    None => key_record.holders + 1,
                };
                key_record.size_bytes = write.size_bytes;
                key_record.expires_at = write.expires_at;
                key_record.last_accessed_at = current_timestamp_ms();
            }
        });
    }

    pub(crate) fn record_delete(&self, service: &str, key: &str, size_bytes: u64) {
        self.with_service(service, |record| {
            record.stats.keys_deleted += 1;
            record.release(key, size_bytes);
        });
    }

    pub(crate) fn record_eviction(&self, service: &str, key: &str, size_bytes: u64) {
        self.with_service(service, |record| {
            record.stats.evictions += 1;
            record.stats.keys_deleted += 1;
            record.release(key, size_bytes);
        });
    }

    /// Expiry is not an eviction: only gauges move.
    pub(crate) fn record_expired(&self, service: &str, key: &str, size_bytes: u64) {
        self.with_service(service, |record| record.release(key, size_bytes));
    }

    pub(crate) fn record_flush(&self, service: &str) {
        self.with_service(service, |record| {
            record.stats.keys = 0;
            record.stats.size_bytes = 0;
            record.keys.clear();
        });
    }

    pub(crate) fn record_ttl(&self, service: &str, key: &str, expires_at: Option<u64>) {
        self.with_service(service, |record| {
            if let Some(key_record) = record.keys.get_mut(key) {
                key_record.expires_at = expires_at;
            }
        });
    }

    /// Size last reported for `key`, if the registry still tracks it.
    pub(crate) fn tracked_size(&self, service: &str, key: &str) -> Option<u64> {
        self.services
            .read()
            .get(service)
            .and_then(|record| record.keys.get(key))
            .map(|key_record| key_record.size_bytes)
    }
}

fn snapshot_keys(record: &ServiceRecord) -> HashMap<String, KeyStats> {
    record
        .keys
        .iter()
        .map(|(key, key_record)| (key.clone(), key_record.snapshot()))
        .collect()
}

// == Stats Reporter ==
/// Registry handle bound to one service identifier, used by the engines.
#[derive(Debug, Clone)]
pub(crate) struct StatsReporter {
    registry: Arc<StatsRegistry>,
    service: Arc<str>,
    notify: bool,
}

impl StatsReporter {
    pub fn new(registry: Arc<StatsRegistry>, service: &str, notify: bool) -> Self {
        Self {
            registry,
            service: Arc::from(service),
            notify,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn registry(&self) -> &Arc<StatsRegistry> {
        &self.registry
    }

    fn publish(&self, kind: StatsEventKind, key: Option<&str>) {
        if self.notify {
            self.registry.publish(StatsEvent {
                service_identifier: self.service.to_string(),
                kind,
                key: key.map(str::to_string),
            });
        }
    }

    pub fn hit(&self, key: &str) {
        self.registry.record_hit(&self.service, key);
    }

    pub fn miss(&self, key: &str) {
        self.registry.record_miss(&self.service, key);
    }

    pub fn set(&self, key: &str, write: KeyWrite) {
        self.registry.record_set(&self.service, key, write);
        self.publish(StatsEventKind::Set, Some(key));
    }

    pub fn delete(&self, key: &str, size_bytes: u64) {
        self.registry.record_delete(&self.service, key, size_bytes);
        self.publish(StatsEventKind::Delete, Some(key));
    }

    pub fn evict(&self, key: &str, size_bytes: u64) {
        self.registry.record_eviction(&self.service, key, size_bytes);
        self.publish(StatsEventKind::Evict, Some(key));
    }

    pub fn expire(&self, key: &str, size_bytes: u64) {
        self.registry.record_expired(&self.service, key, size_bytes);
        self.publish(StatsEventKind::Expire, Some(key));
    }

    pub fn flush(&self) {
        self.registry.record_flush(&self.service);
        self.publish(StatsEventKind::Flush, None);
    }

    pub fn ttl(&self, key: &str, expires_at: Option<u64>) {
        self.registry.record_ttl(&self.service, key, expires_at);
        self.publish(StatsEventKind::Ttl, Some(key));
    }

    pub fn tracked_size(&self, key: &str) -> Option<u64> {
        self.registry.tracked_size(&self.service, key)
    }
}

// == Registration Guard ==
/// Keeps a service registered for as long as the owning cache instance lives.
#[derive(Debug)]
pub(crate) struct Registration {
    registry: Arc<StatsRegistry>,
    service: String,
    track_keys: bool,
}

impl Registration {
    pub fn new(registry: &Arc<StatsRegistry>, service: &str, track_keys: bool) -> Self {
        registry.register(service, track_keys);
        Self {
            registry: Arc::clone(registry),
            service: service.to_string(),
            track_keys,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.service, self.track_keys);
    }
}
