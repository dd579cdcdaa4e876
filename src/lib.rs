//! statcache - Pluggable caching layer with a process-wide stats registry
//!
//! Named cache instances backed either by an in-process memory store (TTL
//! expiration, memory-bounded LRU eviction) or by Redis, behind one contract.
//! Every instance reports its hits, misses, writes and evictions to a
//! [`StatsRegistry`] that monitoring code can snapshot or subscribe to.

pub mod cache;
pub mod config;
pub mod error;
pub mod stats;
mod tasks;

pub use cache::CacheService;
pub use config::{CacheConfig, CacheType, RemoteOptions};
pub use error::{CacheError, Result};
pub use stats::{CacheInstanceStats, KeyStats, StatsEvent, StatsEventKind, StatsRegistry};
