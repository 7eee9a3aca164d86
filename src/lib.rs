//! courtcache - Availability caching for court booking
//!
//! This library sits between request handlers and a slow upstream booking
//! API:
//! - Read-through caching of clubs, courts and slots with per-kind TTLs
//! - Shadow copies served when the upstream fails
//! - Event-driven invalidation through a bounded, fire-and-forget queue
//! - Bounded fan-out to build the availability of a whole place for a day
//!
//! The backing store is Redis in production; an in-process Moka store is
//! available for tests and single-instance deployments.

mod aggregator;
mod backend;
mod cache_store;
mod cached_upstream;
mod config;
mod court_cache;
mod dispatcher;
mod error;
pub mod events;
mod invalidation;
pub mod keys;
mod memory_backend;
pub mod model;
mod redis_backend;
mod upstream;

pub use aggregator::{AvailabilityAggregator, fan_out};
pub use backend::CacheBackend;
pub use cache_store::{CacheStore, Cacheable};
pub use cached_upstream::CachedUpstream;
pub use config::{CacheConfig, FanOutStrategy};
pub use court_cache::CourtCache;
pub use dispatcher::EventDispatcher;
pub use error::{BoxError, CacheError, DispatchError, InvalidationError, UpstreamError};
pub use events::ChangeEvent;
pub use invalidation::{InvalidationEngine, SEARCH_WINDOW_DAYS, Today};
pub use memory_backend::MemoryBackend;
pub use model::{
    Club, ClubId, ClubWithAvailability, Court, CourtId, CourtWithAvailability, PlaceId, Slot,
};
pub use redis_backend::RedisBackend;
pub use upstream::UpstreamClient;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
