//! Cache Module
//!
//! The unified cache contract and its two backends: an in-memory store with
//! TTL expiration and memory-bounded LRU eviction, and a Redis-backed store.

mod entry;
mod local;
mod lru;
mod remote;
mod service;
mod store;


pub use service::CacheService;

pub(crate) use entry::{current_timestamp_ms, estimate_size, expiry_from_ttl, CacheEntry};
pub(crate) use lru::LruTracker;
pub(crate) use store::CacheStore;
