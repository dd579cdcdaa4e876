//! LRU Tracker Module
//!
//! Orders keys for memory-pressure eviction.

use std::collections::{BTreeMap, HashMap};

/// Eviction rank of a key. Smaller ranks are evicted first.
///
/// Ordered by last access time, then by access count (fewer accesses go
/// first), then by a per-tracker sequence number so equal timestamps still
/// resolve in access order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct AccessRank {
    last_accessed_at: u64,
    access_count: u64,
    seq: u64,
}

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Keys ordered from least to most recently used
    order: BTreeMap<AccessRank, String>,
    /// Current rank of each tracked key
    ranks: HashMap<String, AccessRank>,
    next_seq: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Records an access for `key`, inserting it if untracked.
    pub fn touch(&mut self, key: &str, last_accessed_at: u64, access_count: u64) {
        self.remove(key);

        let rank = AccessRank {
            last_accessed_at,
            access_count,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.order.insert(rank, key.to_string());
        self.ranks.insert(key.to_string(), rank);
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(rank) = self.ranks.remove(key) {
            self.order.remove(&rank);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.ranks.remove(&key);
        Some(key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.ranks.clear();
    }
}
