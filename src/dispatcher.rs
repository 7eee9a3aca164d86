//! Fire-and-forget event dispatch
//!
//! Events go through a bounded queue into a single dispatch loop. The loop
//! takes a worker permit and spawns one task per event, so at most
//! `event_workers` handlers run at once and producers feel backpressure
//! once the queue is full. Handler errors and panics are logged and never
//! stop the loop.

use std::sync::Arc;

use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

use crate::{CacheConfig, InvalidationEngine, error::DispatchError, events::ChangeEvent};

/// Handle to the running dispatch loop
pub struct EventDispatcher {
    tx: mpsc::Sender<ChangeEvent>,
    handle: JoinHandle<()>,
}

impl EventDispatcher {
    /// Start the dispatch loop on the current Tokio runtime
    pub fn start(engine: InvalidationEngine, config: &CacheConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.event_queue_capacity.max(1));
        let workers = config.event_workers.max(1);
        let handle = tokio::spawn(dispatch_loop(engine, rx, workers));
        Self { tx, handle }
    }

    /// Queue an event, waiting for room when the queue is full
    pub async fn dispatch(&self, event: ChangeEvent) -> Result<(), DispatchError> {
        self.tx.send(event).await.map_err(|_| DispatchError::Closed)
    }

    /// Queue an event without waiting
    pub fn try_dispatch(&self, event: ChangeEvent) -> Result<(), DispatchError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::Full,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }

    /// Stop accepting events and wait until every queued and running
    /// handler has finished
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            error!("EventDispatcher: dispatch loop ended abnormally: {}", e);
        }
    }
}

async fn dispatch_loop(
    engine: InvalidationEngine,
    mut rx: mpsc::Receiver<ChangeEvent>,
    workers: usize,
) {
    let permits = Arc::new(Semaphore::new(workers));

    while let Some(event) = rx.recv().await {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let engine = engine.clone();

        let task = tokio::spawn(async move {
            let _permit = permit;
            debug!(
                "EventDispatcher: handling {} for club {}",
                event.kind(),
                event.club_id()
            );
            if let Err(e) = engine.handle(&event).await {
                warn!(
                    "EventDispatcher: {} for club {} failed: {}",
                    event.kind(),
                    event.club_id(),
                    e
                );
            }
        });

        // Report panics without blocking the loop
        tokio::spawn(async move {
            if let Err(e) = task.await
                && e.is_panic()
            {
                error!("EventDispatcher: invalidation handler panicked: {}", e);
            }
        });
    }

    // Drain: every permit back means every handler finished
    let _ = permits.acquire_many(workers as u32).await;
    debug!("EventDispatcher: stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache_store::tests::memory_store,
        keys::{self, ttl},
        model::Slot,
    };
    use chrono::NaiveDate;

    fn slot_booked(court_id: u64, datetime: &str) -> ChangeEvent {
        ChangeEvent::SlotBooked {
            club_id: 166,
            court_id,
            slot: Slot {
                datetime: datetime.to_owned(),
                start: "09:00".to_owned(),
                end: "10:00".to_owned(),
                duration: 60,
                price: 4000.0,
                priority: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_events_are_handled_before_shutdown_returns() {
        let (store, _) = memory_store();
        let day = NaiveDate::from_ymd_opt(2022, 8, 25).unwrap();
        for court in 0..20 {
            store
                .set(&keys::slots(166, court, day), &Vec::<Slot>::new(), ttl::SLOTS)
                .await;
        }

        let config = CacheConfig {
            event_workers: 3,
            event_queue_capacity: 4,
            ..CacheConfig::default()
        };
        let dispatcher = EventDispatcher::start(InvalidationEngine::new(store.clone()), &config);
        for court in 0..20 {
            dispatcher
                .dispatch(slot_booked(court, "2022-08-25 09:00"))
                .await
                .unwrap();
        }
        dispatcher.shutdown().await;

        for court in 0..20 {
            assert!(
                store
                    .get_with_stale::<Vec<Slot>>(&keys::slots(166, court, day))
                    .await
                    .is_none()
            );
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_consumption() {
        let (store, _) = memory_store();
        let day = NaiveDate::from_ymd_opt(2022, 8, 25).unwrap();
        let key = keys::slots(166, 1, day);
        store.set(&key, &Vec::<Slot>::new(), ttl::SLOTS).await;

        let dispatcher =
            EventDispatcher::start(InvalidationEngine::new(store.clone()), &CacheConfig::default());
        dispatcher
            .dispatch(slot_booked(1, "not a datetime"))
            .await
            .unwrap();
        dispatcher
            .dispatch(slot_booked(1, "2022-08-25 09:00"))
            .await
            .unwrap();
        dispatcher.shutdown().await;

        assert!(store.get_with_stale::<Vec<Slot>>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_try_dispatch_reports_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let dispatcher = EventDispatcher {
            tx,
            handle: tokio::spawn(async {}),
        };

        dispatcher
            .try_dispatch(slot_booked(1, "2022-08-25 09:00"))
            .unwrap();
        assert!(matches!(
            dispatcher.try_dispatch(slot_booked(2, "2022-08-25 09:00")),
            Err(DispatchError::Full)
        ));
    }

    #[tokio::test]
    async fn test_dispatch_after_loop_gone_is_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let dispatcher = EventDispatcher {
            tx,
            handle: tokio::spawn(async {}),
        };

        assert!(matches!(
            dispatcher.dispatch(slot_booked(1, "2022-08-25 09:00")).await,
            Err(DispatchError::Closed)
        ));
    }
}
