//! Redis-backed store
//!
//! Keys are written with `SET ... EX` so Redis handles expiry; a write
//! without TTL persists the key.

use super::{KvStore, StoreError, StoreResult};
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use std::time::Duration;

/// Redis store sharing one multiplexed connection
#[derive(Clone)]
pub struct RedisStore {
    conn_manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Backend(format!("Failed to create Redis client: {e}")))?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Backend(format!("Failed to create Redis connection manager: {e}"))
        })?;
        Ok(Self { conn_manager })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn_manager.clone();
        conn.get(key)
            .await
            .map_err(|e| StoreError::Backend(format!("GET {key} failed: {e}")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn_manager.clone();
        let result: Result<(), _> = match ttl {
            // Redis rejects EX 0, round sub-second TTLs up
            Some(ttl) => conn.set_ex(key, value, ttl.as_secs().max(1)).await,
            None => conn.set(key, value).await,
        };
        result.map_err(|e| StoreError::Backend(format!("SET {key} failed: {e}")))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn_manager.clone();
        let _: i64 = conn
            .del(key)
            .await
            .map_err(|e| StoreError::Backend(format!("DEL {key} failed: {e}")))?;
        Ok(())
    }
}
