//! Cache Store Module
//!
//! Synchronous core of the local backend: HashMap storage with size
//! accounting, LRU ordering, lazy TTL checks and memory-bounded eviction.
//! The store never talks to the stats registry; every mutation returns an
//! outcome the caller reports while still holding the lock.

use std::collections::HashMap;

use crate::cache::{current_timestamp_ms, CacheEntry, LruTracker};

/// Result of a read against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Live value
    Hit(String),
    /// Key was never set or already removed
    Miss,
    /// Key was present but past its expiry; it has been reclaimed
    Expired { size_bytes: u64 },
}

/// Result of a delete against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted { size_bytes: u64 },
    Expired { size_bytes: u64 },
    Absent,
}

/// Everything a write changed, in the order it happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOutcome {
    /// Expired entries reclaimed while making room, with their sizes
    pub expired: Vec<(String, u64)>,
    /// Live entries evicted to satisfy the memory bound, with their sizes
    pub evicted: Vec<(String, u64)>,
    /// Size of the stored entry
    pub size_bytes: u64,
    /// Size of the live entry that was overwritten, `None` if the key is new
    pub previous_size: Option<u64>,
    pub expires_at: Option<u64>,
}

// == Cache Store ==
/// In-memory storage with memory-bounded LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Eviction order
    lru: LruTracker,
    /// Sum of `size_bytes` over every physically present entry
    total_size: u64,
    /// Memory bound in bytes, None = unbounded
    max_bytes: Option<u64>,
    /// TTL applied when a write carries none, None = never expires
    default_ttl: Option<u64>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore.
    ///
    /// # Arguments
    /// * `max_bytes` - Optional memory bound in bytes
    /// * `default_ttl` - Optional default TTL in seconds
    pub fn new(max_bytes: Option<u64>, default_ttl: Option<u64>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            total_size: 0,
            max_bytes,
            default_ttl,
        }
    }

    // == Set ==
    /// Stores a serialized value, evicting least recently used entries first
    /// if the write would push the store over its memory bound.
    ///
    /// `ttl` overrides the default; `Some(0)` stores without expiry. A value
    /// larger than the bound on its own still lands after everything else
    /// has been evicted.
    pub fn set(&mut self, key: String, value: String, ttl: Option<u64>) -> SetOutcome {
        let mut outcome = SetOutcome::default();

        let mut entry = CacheEntry::new(key.clone(), value, ttl.or(self.default_ttl));

        if let Some(old) = self.take(&key) {
            if old.is_expired() {
                outcome.expired.push((key.clone(), old.size_bytes));
            } else {
                outcome.previous_size = Some(old.size_bytes);
                entry.access_count = old.access_count + 1;
            }
        }

        if let Some(max_bytes) = self.max_bytes {
            if self.total_size + entry.size_bytes > max_bytes {
                // Expired entries are already logically gone; reclaim them first
                outcome.expired.extend(self.cleanup_expired());

                while self.total_size + entry.size_bytes > max_bytes {
                    let Some(victim) = self.lru.evict_oldest() else {
                        break;
                    };
                    if let Some(evicted) = self.entries.remove(&victim) {
                        self.total_size -= evicted.size_bytes;
                        outcome.evicted.push((victim, evicted.size_bytes));
                    }
                }
            }
        }

        outcome.size_bytes = entry.size_bytes;
        outcome.expires_at = entry.expires_at;

        self.lru
            .touch(&key, entry.last_accessed_at, entry.access_count);
        self.total_size += entry.size_bytes;
        self.entries.insert(key, entry);

        outcome
    }

    // == Get ==
    /// Retrieves a value by key, recording the access.
    ///
    /// Expired entries are never returned; they are reclaimed on the spot.
    pub fn get(&mut self, key: &str) -> Lookup {
        let now = current_timestamp_ms();

        match self.entries.get_mut(key) {
            Some(entry) if entry.is_expired_at(now) => {
                let size_bytes = entry.size_bytes;
                self.take(key);
                Lookup::Expired { size_bytes }
            }
            Some(entry) => {
                entry.touch();
                self.lru
                    .touch(key, entry.last_accessed_at, entry.access_count);
                Lookup::Hit(entry.value.clone())
            }
            None => Lookup::Miss,
        }
    }

    // == Contains ==
    /// Returns true if a live entry exists, without recording an access.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Delete ==
    /// Removes an entry by key.
    pub fn delete(&mut self, key: &str) -> Removal {
        match self.take(key) {
            Some(entry) if entry.is_expired() => Removal::Expired {
                size_bytes: entry.size_bytes,
            },
            Some(entry) => Removal::Deleted {
                size_bytes: entry.size_bytes,
            },
            None => Removal::Absent,
        }
    }

    // == Clear ==
    /// Drops every entry. Returns the number of entries removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.total_size = 0;
        count
    }

    // == TTL ==
    /// Remaining TTL in seconds of a live key.
    ///
    /// `None` if the key is absent, `Some(None)` if it never expires.
    pub fn ttl(&self, key: &str) -> Option<Option<u64>> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(CacheEntry::ttl_remaining)
    }

    /// Replaces the expiry of a live key, `0` persists it.
    ///
    /// Returns the new absolute expiry, or `None` if the key is not live.
    pub fn set_ttl(&mut self, key: &str, ttl_seconds: u64) -> Option<Option<u64>> {
        let entry = self
            .entries
            .get_mut(key)
            .filter(|entry| !entry.is_expired())?;
        entry.set_ttl(Some(ttl_seconds));
        Some(entry.expires_at)
    }

    // == Keys ==
    /// Live keys in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let now = current_timestamp_ms();
        self.entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    // == Expired Keys ==
    /// Keys whose expiry has passed but which are still physically present.
    pub fn expired_keys(&self) -> Vec<String> {
        let now = current_timestamp_ms();
        self.entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Removes `key` only if it is still expired. Returns its size.
    pub fn remove_if_expired(&mut self, key: &str) -> Option<u64> {
        if !self.entries.get(key)?.is_expired() {
            return None;
        }
        self.take(key).map(|entry| entry.size_bytes)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache, returning keys and sizes.
    pub fn cleanup_expired(&mut self) -> Vec<(String, u64)> {
        self.expired_keys()
            .into_iter()
            .filter_map(|key| {
                let size_bytes = self.take(&key)?.size_bytes;
                Some((key, size_bytes))
            })
            .collect()
    }

    // == Length ==
    /// Number of physically present entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Tracked footprint of every physically present entry.
    pub fn size_bytes(&self) -> u64 {
        self.total_size
    }

    fn take(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.total_size -= entry.size_bytes;
        Some(entry)
    }
}
