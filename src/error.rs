//! Error types

use std::time::Duration;

use redis::RedisError;

/// Boxed error used at the pluggable seams (upstream client, custom backends)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by the upstream client, surfaced unchanged to callers
/// when no shadow copy can absorb them.
pub type UpstreamError = BoxError;

/// Backing-store errors.
///
/// Only raised by [`CacheBackend`](crate::CacheBackend) implementations;
/// [`CacheStore`](crate::CacheStore) absorbs all of them.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] BoxError),

    #[error("Timed out after {timeout:?} connecting to Redis")]
    ConnectTimeout { timeout: Duration },
}

/// Errors raised while translating a change event into cache deletions
#[derive(Debug, thiserror::Error)]
pub enum InvalidationError {
    #[error("Invalid slot datetime '{datetime}': {source}")]
    InvalidSlotDate {
        datetime: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Errors raised when handing an event to the dispatcher
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Event queue is closed")]
    Closed,

    #[error("Event queue is full")]
    Full,
}
