//! Event-driven invalidation
//!
//! One handler per [`ChangeEvent`] variant. Handlers only delete, so
//! delivering the same event twice is harmless.
//!
//! Metadata changes are invalidated coarsely (whole keys plus a seven day
//! sweep of search results); slot changes only touch the affected day.
//! Search keys are reached through the club → place index; when the index
//! entry is missing the search sweep is skipped.

use std::sync::Arc;

use chrono::{Days, Local, NaiveDate};
use tracing::{debug, info};

use crate::{
    CacheStore,
    error::InvalidationError,
    events::{ChangeEvent, OPENING_HOURS_FIELD},
    keys,
    model::{ClubId, CourtId, PlaceId, Slot},
};

/// Number of days, starting today, whose search results a metadata change
/// invalidates
pub const SEARCH_WINDOW_DAYS: u64 = 7;

/// Source of "today" for the search sweep
pub type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Turns change events into cache deletions
#[derive(Clone)]
pub struct InvalidationEngine {
    store: CacheStore,
    today: Today,
}

impl InvalidationEngine {
    /// Engine whose search sweep starts at the local calendar day
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            today: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Replace the clock used for the search sweep
    pub fn with_today(mut self, today: Today) -> Self {
        self.today = today;
        self
    }

    /// Delete every cache entry `event` may have made stale
    pub async fn handle(&self, event: &ChangeEvent) -> Result<(), InvalidationError> {
        match event {
            ChangeEvent::ClubUpdated { club_id, fields } => {
                self.club_updated(*club_id, fields).await;
                Ok(())
            }
            ChangeEvent::CourtUpdated {
                club_id,
                court_id,
                fields,
            } => {
                self.court_updated(*club_id, *court_id, fields).await;
                Ok(())
            }
            ChangeEvent::SlotBooked {
                club_id,
                court_id,
                slot,
            } => {
                info!(
                    "Slot booked - Club {}, Court {}, Datetime {}",
                    club_id, court_id, slot.datetime
                );
                self.slot_changed(*club_id, *court_id, slot).await
            }
            ChangeEvent::SlotAvailable {
                club_id,
                court_id,
                slot,
            } => {
                info!(
                    "Slot available - Club {}, Court {}, Datetime {}",
                    club_id, court_id, slot.datetime
                );
                self.slot_changed(*club_id, *court_id, slot).await
            }
        }
    }

    async fn place_of(&self, club_id: ClubId) -> Option<PlaceId> {
        let place = self.store.get::<PlaceId>(&keys::club_to_place(club_id)).await;
        if place.is_none() {
            debug!("No place indexed for club {}; search keys left alone", club_id);
        }
        place
    }

    async fn club_updated(&self, club_id: ClubId, fields: &[String]) {
        info!("Club {} updated - Fields: {}", club_id, fields.join(", "));

        let place_id = self.place_of(club_id).await;
        if let Some(place_id) = &place_id {
            self.store.del(&keys::clubs(place_id)).await;
        }

        self.store.del(&keys::courts(club_id)).await;

        if fields.iter().any(|f| f == OPENING_HOURS_FIELD) {
            self.store
                .del_pattern(&keys::club_slots_pattern(club_id))
                .await;
        }

        if let Some(place_id) = &place_id {
            self.sweep_search(place_id).await;
        }
    }

    /// Every court change is treated as availability-affecting; `fields`
    /// is only logged.
    async fn court_updated(&self, club_id: ClubId, court_id: CourtId, fields: &[String]) {
        info!(
            "Court updated - Club {}, Court {}, Fields: {}",
            club_id,
            court_id,
            fields.join(", ")
        );

        self.store.del(&keys::courts(club_id)).await;

        if let Some(place_id) = self.place_of(club_id).await {
            self.sweep_search(&place_id).await;
        }
    }

    async fn slot_changed(
        &self,
        club_id: ClubId,
        court_id: CourtId,
        slot: &Slot,
    ) -> Result<(), InvalidationError> {
        let day = slot.day()?;

        self.store.del(&keys::slots(club_id, court_id, day)).await;

        if let Some(place_id) = self.place_of(club_id).await {
            self.store.del(&keys::search(&place_id, day)).await;
        }
        Ok(())
    }

    async fn sweep_search(&self, place_id: &str) {
        let today = (self.today)();
        for offset in 0..SEARCH_WINDOW_DAYS {
            if let Some(day) = today.checked_add_days(Days::new(offset)) {
                self.store.del(&keys::search(place_id, day)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheBackend, CacheConfig, CacheError, MemoryBackend, keys::ttl};
    use std::{sync::Mutex, time::Duration};

    /// Memory backend that records every key it is asked to delete
    #[derive(Default)]
    struct RecordingBackend {
        inner: MemoryBackend,
        deleted: Mutex<Vec<String>>,
    }

    impl RecordingBackend {
        fn deleted(&self) -> Vec<String> {
            let mut keys = self.deleted.lock().unwrap().clone();
            keys.sort();
            keys.dedup();
            keys
        }
    }

    #[async_trait::async_trait]
    impl CacheBackend for RecordingBackend {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.inner.get(key).await
        }

        async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
            self.inner.set_ex(key, value, ttl).await
        }

        async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
            self.deleted.lock().unwrap().extend_from_slice(keys);
            self.inner.del(keys).await
        }

        async fn scan(
            &self,
            cursor: u64,
            pattern: &str,
            count: usize,
        ) -> Result<(u64, Vec<String>), CacheError> {
            self.inner.scan(cursor, pattern, count).await
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 8, 20).unwrap()
    }

    fn engine() -> (InvalidationEngine, CacheStore, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let store = CacheStore::new(backend.clone(), &CacheConfig::default());
        let engine = InvalidationEngine::new(store.clone()).with_today(Arc::new(today));
        (engine, store, backend)
    }

    fn slot(datetime: &str) -> Slot {
        Slot {
            datetime: datetime.to_owned(),
            start: "09:00".to_owned(),
            end: "10:00".to_owned(),
            duration: 60,
            price: 4000.0,
            priority: 0,
        }
    }

    /// Primary keys deleted, with their shadows filtered out
    fn primaries(backend: &RecordingBackend) -> Vec<String> {
        backend
            .deleted()
            .into_iter()
            .filter(|k| !keys::is_shadow(k))
            .collect()
    }

    fn week_of_search(place_id: &str) -> Vec<String> {
        (0..SEARCH_WINDOW_DAYS)
            .map(|i| keys::search(place_id, today().checked_add_days(Days::new(i)).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn test_slot_booked_deletes_exactly_slot_and_search_day() {
        let (engine, store, backend) = engine();
        store
            .set(&keys::club_to_place(166), "G1", ttl::CLUB_TO_PLACE)
            .await;

        engine
            .handle(&ChangeEvent::SlotBooked {
                club_id: 166,
                court_id: 733,
                slot: slot("2022-08-25 09:00"),
            })
            .await
            .unwrap();

        assert_eq!(
            primaries(&backend),
            vec![
                "search:G1:2022-08-25".to_owned(),
                "slots:166:733:2022-08-25".to_owned(),
            ]
        );
        assert!(
            backend
                .deleted()
                .contains(&"slots:166:733:2022-08-25:stale".to_owned())
        );
    }

    #[tokio::test]
    async fn test_slot_available_without_index_only_deletes_slots() {
        let (engine, _, backend) = engine();

        engine
            .handle(&ChangeEvent::SlotAvailable {
                club_id: 166,
                court_id: 733,
                slot: slot("2022-08-25 21:30"),
            })
            .await
            .unwrap();

        assert_eq!(primaries(&backend), vec!["slots:166:733:2022-08-25".to_owned()]);
    }

    #[tokio::test]
    async fn test_slot_event_with_bad_datetime_fails() {
        let (engine, _, backend) = engine();

        let result = engine
            .handle(&ChangeEvent::SlotBooked {
                club_id: 166,
                court_id: 733,
                slot: slot("tomorrow"),
            })
            .await;

        assert!(matches!(
            result,
            Err(InvalidationError::InvalidSlotDate { .. })
        ));
        assert!(backend.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_club_updated_openhours_cascade() {
        let (engine, store, backend) = engine();
        store
            .set(&keys::club_to_place(166), "P1", ttl::CLUB_TO_PLACE)
            .await;
        let day = NaiveDate::from_ymd_opt(2022, 8, 21).unwrap();
        for court in [1, 2, 3] {
            store
                .set(&keys::slots(166, court, day), &Vec::<Slot>::new(), ttl::SLOTS)
                .await;
        }
        store
            .set(&keys::slots(167, 1, day), &Vec::<Slot>::new(), ttl::SLOTS)
            .await;

        engine
            .handle(&ChangeEvent::ClubUpdated {
                club_id: 166,
                fields: vec!["openhours".to_owned()],
            })
            .await
            .unwrap();

        let mut expected = vec![
            "clubs:P1".to_owned(),
            "courts:166".to_owned(),
            "slots:166:1:2022-08-21".to_owned(),
            "slots:166:2:2022-08-21".to_owned(),
            "slots:166:3:2022-08-21".to_owned(),
        ];
        expected.extend(week_of_search("P1"));
        expected.sort();
        assert_eq!(primaries(&backend), expected);

        for court in [1, 2, 3] {
            assert!(
                store
                    .get_with_stale::<Vec<Slot>>(&keys::slots(166, court, day))
                    .await
                    .is_none()
            );
        }
        assert!(
            store
                .get::<Vec<Slot>>(&keys::slots(167, 1, day))
                .await
                .is_some()
        );
        // The index itself is never invalidated
        assert!(store.get::<String>(&keys::club_to_place(166)).await.is_some());
    }

    #[tokio::test]
    async fn test_club_updated_other_fields_keeps_slots() {
        let (engine, store, backend) = engine();
        store
            .set(&keys::club_to_place(166), "P1", ttl::CLUB_TO_PLACE)
            .await;
        let slots_key = keys::slots(166, 1, today());
        store.set(&slots_key, &Vec::<Slot>::new(), ttl::SLOTS).await;

        engine
            .handle(&ChangeEvent::ClubUpdated {
                club_id: 166,
                fields: vec!["name".to_owned()],
            })
            .await
            .unwrap();

        let mut expected = vec!["clubs:P1".to_owned(), "courts:166".to_owned()];
        expected.extend(week_of_search("P1"));
        expected.sort();
        assert_eq!(primaries(&backend), expected);
        assert!(store.get::<Vec<Slot>>(&slots_key).await.is_some());
    }

    #[tokio::test]
    async fn test_club_updated_without_index_only_deletes_courts() {
        let (engine, _, backend) = engine();

        engine
            .handle(&ChangeEvent::ClubUpdated {
                club_id: 166,
                fields: vec![],
            })
            .await
            .unwrap();

        assert_eq!(primaries(&backend), vec!["courts:166".to_owned()]);
    }

    #[tokio::test]
    async fn test_court_updated_ignores_fields() {
        let (engine, store, backend) = engine();
        store
            .set(&keys::club_to_place(166), "P1", ttl::CLUB_TO_PLACE)
            .await;

        engine
            .handle(&ChangeEvent::CourtUpdated {
                club_id: 166,
                court_id: 733,
                fields: vec!["surface".to_owned()],
            })
            .await
            .unwrap();

        let mut expected = vec!["courts:166".to_owned()];
        expected.extend(week_of_search("P1"));
        expected.sort();
        assert_eq!(primaries(&backend), expected);
    }

    #[tokio::test]
    async fn test_redelivery_is_harmless() {
        let (engine, store, _) = engine();
        store
            .set(&keys::club_to_place(166), "G1", ttl::CLUB_TO_PLACE)
            .await;
        let event = ChangeEvent::SlotBooked {
            club_id: 166,
            court_id: 733,
            slot: slot("2022-08-25 09:00"),
        };

        engine.handle(&event).await.unwrap();
        engine.handle(&event).await.unwrap();

        assert_eq!(
            store.get::<String>(&keys::club_to_place(166)).await.as_deref(),
            Some("G1")
        );
    }
}
