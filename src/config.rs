//! Cache configuration

use std::{env, str::FromStr, time::Duration};

use crate::keys;

/// How a fan-out stage bounds the number of in-flight upstream calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOutStrategy {
    /// Fixed-size chunks; each chunk completes before the next one starts
    #[default]
    Batched,
    /// Sliding window; a new call starts as soon as one finishes
    Window,
}

impl FromStr for FanOutStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batched" | "batch" => Ok(Self::Batched),
            "window" | "sliding" => Ok(Self::Window),
            other => Err(format!("unknown fan-out strategy: {other}")),
        }
    }
}

/// Configuration for the court availability cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Bound on establishing the Redis connection at startup
    pub connect_timeout: Duration,
    /// Time-to-live for shadow (stale) copies of every entry
    pub shadow_ttl: Duration,
    /// Number of keys requested per SCAN round during pattern deletes
    pub scan_batch_size: usize,
    /// Maximum in-flight upstream calls per fan-out stage
    pub fanout_concurrency: usize,
    /// Fan-out scheduling strategy
    pub fanout_strategy: FanOutStrategy,
    /// Maximum number of entries held by the in-process backend
    pub memory_max_capacity: u64,
    /// Capacity of the change event queue
    pub event_queue_capacity: usize,
    /// Maximum number of invalidation handlers running at once
    pub event_workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_owned(),
            connect_timeout: Duration::from_secs(5),
            shadow_ttl: keys::ttl::SHADOW,
            scan_batch_size: 100,
            fanout_concurrency: 10,
            fanout_strategy: FanOutStrategy::Batched,
            memory_max_capacity: 100_000,
            event_queue_capacity: 1024,
            event_workers: 16,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `REDIS_URL`
    /// - `REDIS_CONNECT_TIMEOUT_SECONDS`
    /// - `CACHE_SHADOW_TTL_SECONDS`
    /// - `CACHE_SCAN_BATCH_SIZE`
    /// - `FANOUT_CONCURRENCY`
    /// - `FANOUT_STRATEGY` (`batched` or `window`)
    /// - `CACHE_MEMORY_CAPACITY`
    /// - `EVENT_QUEUE_CAPACITY`
    /// - `EVENT_WORKERS`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Unparsable values are ignored and the default is kept. Zero is not a
    /// valid size for batches, concurrency, queues or workers.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());
        let non_zero = |name: &str, default: usize| {
            parsed(name)
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .unwrap_or(default)
        };

        Self {
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            connect_timeout: parsed("REDIS_CONNECT_TIMEOUT_SECONDS")
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            shadow_ttl: parsed("CACHE_SHADOW_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shadow_ttl),
            scan_batch_size: non_zero("CACHE_SCAN_BATCH_SIZE", defaults.scan_batch_size),
            fanout_concurrency: non_zero("FANOUT_CONCURRENCY", defaults.fanout_concurrency),
            fanout_strategy: lookup("FANOUT_STRATEGY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fanout_strategy),
            memory_max_capacity: parsed("CACHE_MEMORY_CAPACITY")
                .unwrap_or(defaults.memory_max_capacity),
            event_queue_capacity: non_zero("EVENT_QUEUE_CAPACITY", defaults.event_queue_capacity),
            event_workers: non_zero("EVENT_WORKERS", defaults.event_workers),
        }
    }
}
