//! Read-through upstream decorator with stale fallback
//!
//! Wraps an [`UpstreamClient`] and serves every read from the cache when it
//! can:
//! 1. primary or shadow copy present: returned, upstream untouched
//! 2. miss: upstream is called once, the result is cached with the kind's
//!    TTL (shadow refreshed too)
//! 3. upstream failure: the shadow copy is served if there is one,
//!    otherwise the upstream error is returned unchanged

use std::{future::Future, sync::Arc, time::Duration};

use chrono::NaiveDate;
use tracing::{debug, error, warn};

use crate::{
    CacheStore, Cacheable, UpstreamClient,
    error::UpstreamError,
    keys::{self, ttl},
    model::{Club, ClubId, Court, CourtId, Slot},
};

/// Read `key` through the cache, calling `fetch` only on a miss.
///
/// `fetch` is lazy: it is not polled when the cache answers.
pub(crate) async fn read_through<V, Fut>(
    store: &CacheStore,
    key: &str,
    ttl: Duration,
    fetch: Fut,
) -> Result<V, UpstreamError>
where
    V: Cacheable,
    Fut: Future<Output = Result<V, UpstreamError>>,
{
    if let Some(cached) = store.get_with_stale::<V>(key).await {
        return Ok(cached);
    }

    match fetch.await {
        Ok(value) => {
            debug!("Cache miss - fetched from upstream for key: {}", key);
            store.set(key, &value, ttl).await;
            Ok(value)
        }
        Err(e) => match store.get_shadow::<V>(key).await {
            Some(stale) => {
                warn!(
                    "Upstream error for key {} ({}). Serving stale copy.",
                    key, e
                );
                Ok(stale)
            }
            None => {
                error!("Upstream error for key {} with no stale copy: {}", key, e);
                Err(e)
            }
        },
    }
}

/// [`UpstreamClient`] decorator backed by a [`CacheStore`]
pub struct CachedUpstream<U: UpstreamClient> {
    upstream: Arc<U>,
    store: CacheStore,
}

impl<U: UpstreamClient> Clone for CachedUpstream<U> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            store: self.store.clone(),
        }
    }
}

impl<U: UpstreamClient> CachedUpstream<U> {
    /// Cache every read of `upstream` in `store`
    pub fn new(upstream: Arc<U>, store: CacheStore) -> Self {
        Self { upstream, store }
    }

    /// Store the cached reads land in
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Point every listed club at `place_id`; the latest listing wins.
    async fn index_clubs(&self, place_id: &str, clubs: &[Club]) {
        for club in clubs {
            self.store
                .set(&keys::club_to_place(club.id), place_id, ttl::CLUB_TO_PLACE)
                .await;
        }
    }
}

#[async_trait::async_trait]
impl<U: UpstreamClient> UpstreamClient for CachedUpstream<U> {
    async fn get_clubs(&self, place_id: &str) -> Result<Vec<Club>, UpstreamError> {
        let key = keys::clubs(place_id);
        read_through(&self.store, &key, ttl::CLUBS, async {
            let clubs = self.upstream.get_clubs(place_id).await?;
            self.index_clubs(place_id, &clubs).await;
            Ok(clubs)
        })
        .await
    }

    async fn get_courts(&self, club_id: ClubId) -> Result<Vec<Court>, UpstreamError> {
        let key = keys::courts(club_id);
        read_through(
            &self.store,
            &key,
            ttl::COURTS,
            self.upstream.get_courts(club_id),
        )
        .await
    }

    async fn get_available_slots(
        &self,
        club_id: ClubId,
        court_id: CourtId,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, UpstreamError> {
        let key = keys::slots(club_id, court_id, date);
        read_through(
            &self.store,
            &key,
            ttl::SLOTS,
            self.upstream.get_available_slots(club_id, court_id, date),
        )
        .await
    }
}
