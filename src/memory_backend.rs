//! In-process backing store on top of Moka
//!
//! Mirrors the Redis behavior this crate relies on: per-key TTL expiry,
//! glob-pattern SCAN with a cursor, multi-key DEL. Useful for tests and
//! single-instance deployments without Redis.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use moka::{Expiry, future::Cache};

use crate::{CacheBackend, CacheConfig, CacheError, keys::pattern_matches};

#[derive(Clone)]
struct StoredValue {
    value: Arc<str>,
    ttl: Duration,
}

/// Expires every entry after the TTL it was last written with
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Abandoned scans are forgotten after this long
const SCAN_SESSION_TTL: Duration = Duration::from_secs(60);

/// [`CacheBackend`] held in process memory
#[derive(Clone)]
pub struct MemoryBackend {
    cache: Cache<String, StoredValue>,
    /// Key snapshots of in-progress scans, by session id
    scans: Cache<u32, Arc<Vec<String>>>,
    next_scan: Arc<AtomicU32>,
}

impl MemoryBackend {
    /// Store holding at most `max_capacity` entries
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        let scans = Cache::builder().time_to_idle(SCAN_SESSION_TTL).build();
        Self {
            cache,
            scans,
            next_scan: Arc::new(AtomicU32::new(1)),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.memory_max_capacity)
    }

    /// Snapshot of every live key, sorted so scan cursors are stable
    fn live_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .cache
            .iter()
            .map(|(key, _)| (*key).clone())
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).await.map(|v| v.value.to_string()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(
                key.to_owned(),
                StoredValue {
                    value: Arc::from(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.cache.invalidate(key).await;
        }
        Ok(())
    }

    /// A scan works on a sorted snapshot of the keys taken when the cursor
    /// is `0`. The cursor packs the snapshot id in its high 32 bits and the
    /// offset into the snapshot in its low 32 bits. Keys deleted since the
    /// snapshot are skipped, keys written since are not seen, as with Redis
    /// SCAN.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let (session, offset) = if cursor == 0 {
            let session = self.next_scan.fetch_add(1, Ordering::Relaxed).max(1);
            self.scans.insert(session, Arc::new(self.live_keys())).await;
            (session, 0usize)
        } else {
            ((cursor >> 32) as u32, (cursor & u64::from(u32::MAX)) as usize)
        };

        let Some(snapshot) = self.scans.get(&session).await else {
            // Unknown or expired session: nothing left to walk
            return Ok((0, Vec::new()));
        };

        let start = offset.min(snapshot.len());
        let end = start.saturating_add(count.max(1)).min(snapshot.len());
        let matched = snapshot[start..end]
            .iter()
            .filter(|key| pattern_matches(pattern, key) && self.cache.contains_key(key.as_str()))
            .cloned()
            .collect();

        if end >= snapshot.len() {
            self.scans.invalidate(&session).await;
            return Ok((0, matched));
        }
        Ok(((u64::from(session) << 32) | end as u64, matched))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
