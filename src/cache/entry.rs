//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL, size and
//! access metadata.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// The stored value in serialized (JSON) form
    pub value: String,
    /// Footprint used for memory accounting
    pub size_bytes: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = never expires
    pub expires_at: Option<u64>,
    /// Last read or write (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Number of reads and writes since creation
    pub access_count: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// A TTL of `Some(0)` is treated the same as `None`: the entry never expires.
    pub fn new(key: String, value: String, ttl_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        let size_bytes = estimate_size(&value);

        Self {
            key,
            value,
            size_bytes,
            created_at: now,
            expires_at: expiry_from_ttl(now, ttl_seconds),
            last_accessed_at: now,
            access_count: 1,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// the expiration time. Every read path goes through this predicate.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Touch ==
    /// Records a read access.
    pub fn touch(&mut self) {
        self.last_accessed_at = current_timestamp_ms();
        self.access_count += 1;
    }

    // == Set Expiry ==
    /// Replaces the expiry relative to now, `None` or `Some(0)` persists the entry.
    pub fn set_ttl(&mut self, ttl_seconds: Option<u64>) {
        self.expires_at = expiry_from_ttl(current_timestamp_ms(), ttl_seconds);
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }

    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| ms / 1000)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Absolute expiry for a TTL starting at `now_ms`.
///
/// Saturates, so an enormous TTL lands at the end of time rather than in the past.
pub fn expiry_from_ttl(now_ms: u64, ttl_seconds: Option<u64>) -> Option<u64> {
    ttl_seconds
        .filter(|ttl| *ttl > 0)
        .map(|ttl| now_ms.saturating_add(ttl.saturating_mul(1000)))
}

/// Estimated footprint of a serialized value.
///
/// Pure function of the serialized form, so identical values always account
/// for the same number of bytes.
pub fn estimate_size(serialized: &str) -> u64 {
    serialized.len() as u64
}
