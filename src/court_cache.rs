//! Process-wide cache handle
//!
//! Wires the backing store, the cached upstream, the aggregator and the
//! event dispatcher together. Create one at startup and share it.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::{
    AvailabilityAggregator, CacheBackend, CacheConfig, CacheError, CacheStore, CachedUpstream,
    EventDispatcher, InvalidationEngine, MemoryBackend, RedisBackend, UpstreamClient,
    error::{DispatchError, UpstreamError},
    events::ChangeEvent,
    model::ClubWithAvailability,
};

/// Entry point: cached availability queries and change event intake
pub struct CourtCache<U: UpstreamClient> {
    store: CacheStore,
    upstream: Arc<CachedUpstream<U>>,
    aggregator: AvailabilityAggregator<CachedUpstream<U>>,
    dispatcher: EventDispatcher,
}

impl<U: UpstreamClient> CourtCache<U> {
    /// Connect to Redis at `config.redis_url` and build the cache on top.
    ///
    /// Fails with [`CacheError::ConnectTimeout`] when no connection is up
    /// within `config.connect_timeout`.
    pub async fn connect(upstream: Arc<U>, config: CacheConfig) -> Result<Self, CacheError> {
        let backend = RedisBackend::connect(&config.redis_url, config.connect_timeout).await?;
        info!("CourtCache: connected to Redis at {}", config.redis_url);
        Ok(Self::new(Arc::new(backend), upstream, config))
    }

    /// Build the cache on an in-process store, for a single instance
    pub fn in_memory(upstream: Arc<U>, config: CacheConfig) -> Self {
        let backend = MemoryBackend::from_config(&config);
        Self::new(Arc::new(backend), upstream, config)
    }

    /// Build the cache on any backing store.
    ///
    /// Must be called from within a Tokio runtime: the event dispatch loop
    /// is spawned here.
    pub fn new(backend: Arc<dyn CacheBackend>, upstream: Arc<U>, config: CacheConfig) -> Self {
        let store = CacheStore::new(backend, &config);
        let upstream = Arc::new(CachedUpstream::new(upstream, store.clone()));
        let aggregator =
            AvailabilityAggregator::new(Arc::clone(&upstream), store.clone(), &config);
        let dispatcher = EventDispatcher::start(InvalidationEngine::new(store.clone()), &config);

        Self {
            store,
            upstream,
            aggregator,
            dispatcher,
        }
    }

    /// See [`AvailabilityAggregator::get_availability`]
    pub async fn get_availability(
        &self,
        place_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ClubWithAvailability>, UpstreamError> {
        self.aggregator.get_availability(place_id, date).await
    }

    /// Aggregate without the search-level cache. Per-resource caching still
    /// applies.
    pub async fn aggregate(
        &self,
        place_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ClubWithAvailability>, UpstreamError> {
        self.aggregator.aggregate(place_id, date).await
    }

    /// Cached view of the upstream for single-resource reads
    pub fn upstream(&self) -> &CachedUpstream<U> {
        &self.upstream
    }

    /// Underlying primary + shadow store
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Queue a change event for invalidation, waiting if the queue is full
    pub async fn publish(&self, event: ChangeEvent) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(event).await
    }

    /// Queue a change event, failing fast if the queue is full
    pub fn try_publish(&self, event: ChangeEvent) -> Result<(), DispatchError> {
        self.dispatcher.try_dispatch(event)
    }

    /// Whether the backing store answers a ping
    pub async fn is_healthy(&self) -> bool {
        self.store.is_healthy().await
    }

    /// Finish pending invalidations and release the backing store
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
        info!("CourtCache: shut down");
    }
}
