//! Stats snapshot types
//!
//! Point-in-time copies handed out by the registry. They own their data, so
//! readers never hold a lock while inspecting them.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::cache::current_timestamp_ms;

// == Cache Instance Stats ==
/// Aggregated metrics for one service identifier.
///
/// Counters are lifetime totals. `keys` and `size_bytes` are gauges and are
/// the only fields reset by a flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheInstanceStats {
    /// Reads that returned a live value
    pub hits: u64,
    /// Reads that found nothing (never set, deleted or expired)
    pub misses: u64,
    /// Writes that created a key
    pub keys_added: u64,
    /// Explicit deletes plus evictions
    pub keys_deleted: u64,
    /// Entries removed to satisfy the memory bound
    pub evictions: u64,
    /// Current number of keys
    pub keys: u64,
    /// Current tracked footprint in bytes
    pub size_bytes: u64,
}

impl CacheInstanceStats {
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Key Stats ==
/// Snapshot of the metrics kept for a single key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyStats {
    pub hits: u64,
    pub misses: u64,
    /// Seconds until expiry at snapshot time, `None` = never expires
    pub ttl_remaining: Option<u64>,
    pub size_bytes: u64,
    pub last_accessed_at: DateTime<Utc>,
}

/// Mutable per-key record held inside the registry.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyRecord {
    pub hits: u64,
    pub misses: u64,
    pub expires_at: Option<u64>,
    pub size_bytes: u64,
    pub last_accessed_at: u64,
    /// Instances sharing the service that currently hold this key
    pub holders: usize,
}

impl KeyRecord {
    pub fn snapshot(&self) -> KeyStats {
        let now = current_timestamp_ms();
        KeyStats {
            hits: self.hits,
            misses: self.misses,
            ttl_remaining: self
                .expires_at
                .map(|expires| expires.saturating_sub(now) / 1000),
            size_bytes: self.size_bytes,
            last_accessed_at: to_datetime(self.last_accessed_at),
        }
    }
}

fn to_datetime(timestamp_ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(timestamp_ms as i64)
        .single()
        .unwrap_or_default()
}
