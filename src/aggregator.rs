//! Availability fan-out
//!
//! Builds the availability of every court of every club in a place for one
//! day, in three stages:
//! 1. clubs of the place
//! 2. courts of each club, at most `concurrency` calls in flight
//! 3. slots of each (club, court) pair, same ceiling, applied on its own
//!
//! Results keep the upstream order of clubs and courts whatever order the
//! calls finish in. The first failure that the upstream client could not
//! absorb fails the whole aggregate, once the calls already in flight have
//! finished and cached their results.
//!
//! [`AvailabilityAggregator::get_availability`] caches whole results per
//! place and day on top of that.

use std::{future::Future, sync::Arc};

use chrono::NaiveDate;
use futures::{StreamExt, future::join_all, stream};
use tracing::debug;

use crate::{
    CacheStore, UpstreamClient,
    cached_upstream::read_through,
    config::{CacheConfig, FanOutStrategy},
    error::UpstreamError,
    keys::{self, ttl},
    model::{ClubWithAvailability, CourtWithAvailability},
};

/// Run `f` over `items` with at most `limit` calls in flight.
///
/// Output order follows input order. Every call that has been started runs
/// to completion, so siblings of a failed call still get to cache their
/// results. The first error in input order is then returned. `Batched`
/// does not start the chunks after a failed one; `Window` runs every item.
pub async fn fan_out<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    strategy: FanOutStrategy,
    f: F,
) -> Result<Vec<R>, UpstreamError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, UpstreamError>>,
{
    let limit = limit.max(1);
    match strategy {
        FanOutStrategy::Batched => {
            let mut results = Vec::with_capacity(items.len());
            let mut items = items.into_iter().peekable();
            while items.peek().is_some() {
                let chunk: Vec<Fut> = items.by_ref().take(limit).map(&f).collect();
                for outcome in join_all(chunk).await {
                    results.push(outcome?);
                }
            }
            Ok(results)
        }
        FanOutStrategy::Window => stream::iter(items)
            .map(f)
            .buffered(limit)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect(),
    }
}

/// Builds place-wide availability on top of an [`UpstreamClient`],
/// normally a [`CachedUpstream`](crate::CachedUpstream)
pub struct AvailabilityAggregator<U: UpstreamClient> {
    upstream: Arc<U>,
    store: CacheStore,
    concurrency: usize,
    strategy: FanOutStrategy,
}

impl<U: UpstreamClient> Clone for AvailabilityAggregator<U> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            store: self.store.clone(),
            concurrency: self.concurrency,
            strategy: self.strategy,
        }
    }
}

impl<U: UpstreamClient> AvailabilityAggregator<U> {
    /// Aggregator caching whole results in `store`, with the fan-out limit
    /// and strategy of `config`
    pub fn new(upstream: Arc<U>, store: CacheStore, config: &CacheConfig) -> Self {
        Self {
            upstream,
            store,
            concurrency: config.fanout_concurrency.max(1),
            strategy: config.fanout_strategy,
        }
    }

    /// Availability of every court in `place_id` on `date`, served from the
    /// search cache when possible, with the same stale fallback as single
    /// resources
    pub async fn get_availability(
        &self,
        place_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ClubWithAvailability>, UpstreamError> {
        read_through(
            &self.store,
            &keys::search(place_id, date),
            ttl::SEARCH,
            self.aggregate(place_id, date),
        )
        .await
    }

    /// Availability of every court in `place_id` on `date`, straight from
    /// the upstream client
    pub async fn aggregate(
        &self,
        place_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ClubWithAvailability>, UpstreamError> {
        let clubs = self.upstream.get_clubs(place_id).await?;

        let club_ids = clubs.iter().map(|club| club.id).collect();
        let courts_per_club = fan_out(club_ids, self.concurrency, self.strategy, |club_id| {
            self.upstream.get_courts(club_id)
        })
        .await?;

        let pairs = clubs
            .iter()
            .zip(&courts_per_club)
            .flat_map(|(club, courts)| courts.iter().map(move |court| (club.id, court.id)))
            .collect::<Vec<_>>();
        debug!(
            "Aggregating availability for place {} on {}: {} clubs, {} courts",
            place_id,
            date,
            clubs.len(),
            pairs.len()
        );

        let slots = fan_out(pairs, self.concurrency, self.strategy, |(club_id, court_id)| {
            self.upstream.get_available_slots(club_id, court_id, date)
        })
        .await?;

        let mut slots = slots.into_iter();
        let result = clubs
            .into_iter()
            .zip(courts_per_club)
            .map(|(club, courts)| ClubWithAvailability {
                club,
                courts: courts
                    .into_iter()
                    .map(|court| CourtWithAvailability {
                        court,
                        available: slots.next().unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect();

        Ok(result)
    }
}
