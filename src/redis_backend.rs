//! Redis backing store
//!
//! Uses a single [`redis::aio::ConnectionManager`] shared by every clone,
//! which reconnects on its own after connection drops. The manager also
//! keeps retrying a refused first connection, so establishing it is bounded
//! by a timeout.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::debug;

use crate::{CacheBackend, CacheError};

/// [`CacheBackend`] on a Redis server
#[derive(Clone)]
pub struct RedisBackend {
    conn: redis::aio::ConnectionManager,
}

impl RedisBackend {
    /// Open a managed connection to the Redis server at `url`, giving up
    /// after `timeout`
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Self::new(client, timeout).await
    }

    pub async fn new(redis_client: redis::Client, timeout: Duration) -> Result<Self, CacheError> {
        let conn = tokio::time::timeout(timeout, redis::aio::ConnectionManager::new(redis_client))
            .await
            .map_err(|_| CacheError::ConnectTimeout { timeout })??;
        debug!("RedisBackend: connection manager ready");
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys.to_vec()).await?;
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let mut conn = self.conn.clone();
        let (next, keys) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async::<(u64, Vec<String>)>(&mut conn)
            .await?;
        Ok((next, keys))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
