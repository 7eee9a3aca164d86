//! Backing store seam
//!
//! [`CacheStore`](crate::CacheStore) talks to the backing store only
//! through this trait. Implementations report every failure; deciding what
//! to absorb is the store's job.

use std::time::Duration;

use crate::CacheError;

/// Raw key-value operations a backing store must offer
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Read the serialized value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write `value` under `key`, expiring after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete every key in `keys`. Missing keys are not an error.
    async fn del(&self, keys: &[String]) -> Result<(), CacheError>;

    /// One round of an incremental scan.
    ///
    /// Returns the cursor for the next round and the keys matching
    /// `pattern` seen in this round. A returned cursor of `0` means the
    /// iteration is complete. `count` is a hint for how many keys to
    /// examine per round.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError>;

    /// Liveness check
    async fn ping(&self) -> Result<(), CacheError>;

    /// Short name used in log lines
    fn name(&self) -> &'static str;
}
