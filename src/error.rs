//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror. A cache miss is never an
//! error: reads return `Ok(None)` for absent or expired keys.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be encoded for storage or decoded into the requested type
    #[error("Serialization failure: {0}")]
    Serialization(String),

    /// Remote store connection lost or the operation was rejected
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Invalid construction options
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Returns true if the error came from the storage backend rather than the caller.
    pub fn is_backend(&self) -> bool {
        matches!(self, CacheError::BackendUnavailable(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::BackendUnavailable(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
