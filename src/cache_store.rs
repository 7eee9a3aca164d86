//! Primary + shadow cache store
//!
//! Every value written through [`CacheStore::set`] lands twice:
//! - primary copy under `key`, with the caller's TTL
//! - shadow copy under `key:stale`, with the long shadow TTL
//!
//! The shadow outlives the primary so a last-known-good value is still
//! around when the primary has expired and the upstream is failing.
//!
//! The store never fails its caller. Backing-store read and delete errors
//! degrade to "not found" / no-op, write errors are logged and dropped.

use std::{collections::HashSet, sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, info, warn};

use crate::{CacheBackend, CacheConfig, keys};

/// Trait for types that can be cached
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {}
impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Typed, failure-absorbing view over a [`CacheBackend`]
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    shadow_ttl: Duration,
    scan_batch_size: usize,
}

impl CacheStore {
    /// Wrap `backend`, taking the shadow TTL and SCAN batch size from `config`
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            shadow_ttl: config.shadow_ttl,
            scan_batch_size: config.scan_batch_size.max(1),
        }
    }

    /// Read and decode the primary copy of `key`
    pub async fn get<V: Cacheable>(&self, key: &str) -> Option<V> {
        let json = match self.backend.get(key).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!(
                    "{} GET error for key {} ({}). Treating as miss.",
                    self.backend.name(),
                    key,
                    e
                );
                return None;
            }
        };

        match serde_json::from_str::<V>(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Failed to deserialize cached value for key {}: {}. Deleting corrupt entry.",
                    key, e
                );
                if let Err(del_err) = self.backend.del(&[key.to_owned()]).await {
                    warn!("Failed to delete corrupt entry {}: {}", key, del_err);
                }
                None
            }
        }
    }

    /// Read the shadow copy of `key` directly
    pub async fn get_shadow<V: Cacheable>(&self, key: &str) -> Option<V> {
        self.get(&keys::shadow(key)).await
    }

    /// Primary copy if present, else the shadow copy, else nothing
    pub async fn get_with_stale<V: Cacheable>(&self, key: &str) -> Option<V> {
        if let Some(fresh) = self.get(key).await {
            debug!("Cache hit for key: {}", key);
            return Some(fresh);
        }

        let stale = self.get_shadow(key).await;
        if stale.is_some() {
            warn!("Returning stale data for key {}", key);
        } else {
            debug!("Cache miss for key: {}", key);
        }
        stale
    }

    /// Write `value` under `key` with `ttl`, plus its shadow copy.
    ///
    /// Best effort: failures are logged and dropped, never retried.
    pub async fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V, ttl: Duration) {
        // Serialize once for both copies
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                error!("Cache SET serialization error for key {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.backend.set_ex(key, &json, ttl).await {
            error!("Cache SET error for key {}: {}", key, e);
            return;
        }

        if let Err(e) = self
            .backend
            .set_ex(&keys::shadow(key), &json, self.shadow_ttl)
            .await
        {
            error!("Cache SET error for shadow of key {}: {}", key, e);
        }
    }

    /// Delete the primary and shadow copies of `key`
    pub async fn del(&self, key: &str) {
        let targets = [key.to_owned(), keys::shadow(key)];
        if let Err(e) = self.backend.del(&targets).await {
            error!("Cache DEL error for key {}: {}", key, e);
        }
    }

    /// Delete every entry whose key matches `pattern`, primary and shadow.
    ///
    /// Walks the key space in SCAN rounds of `scan_batch_size` keys until
    /// the cursor is exhausted. Returns the number of entries deleted; a
    /// backing-store error stops the walk and reports what was deleted so
    /// far.
    pub async fn del_pattern(&self, pattern: &str) -> u64 {
        let mut cursor = 0;
        let mut deleted = 0u64;
        let mut seen = HashSet::new();

        loop {
            let (next, matched) = match self
                .backend
                .scan(cursor, pattern, self.scan_batch_size)
                .await
            {
                Ok(round) => round,
                Err(e) => {
                    error!("Cache DEL_PATTERN error for pattern {}: {}", pattern, e);
                    return deleted;
                }
            };

            // A matched shadow stands for its primary entry. SCAN may return
            // a key more than once across rounds.
            let fresh: Vec<String> = matched
                .iter()
                .map(|k| keys::primary_of(k).to_owned())
                .filter(|k| seen.insert(k.clone()))
                .collect();
            if !fresh.is_empty() {
                let targets: Vec<String> = fresh
                    .iter()
                    .flat_map(|k| [k.clone(), keys::shadow(k)])
                    .collect();
                if let Err(e) = self.backend.del(&targets).await {
                    error!("Cache DEL_PATTERN error for pattern {}: {}", pattern, e);
                    return deleted;
                }
                deleted += fresh.len() as u64;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        info!("Deleted {} keys matching pattern {}", deleted, pattern);
        deleted
    }

    /// Whether the backing store answers a ping; failures are logged
    pub async fn is_healthy(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("{} health check failed: {}", self.backend.name(), e);
                false
            }
        }
    }
}
