//! Volatile key-value store with per-key expiry
//!
//! Holds per-guest conversation state, the checkpoint rosters and the
//! playlist cursor. Values are strings; typed repositories layer JSON on top.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),
    #[error("Malformed value at {key}: {reason}")]
    Malformed { key: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value store with optional TTL on write
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value; expired and missing keys both yield `None`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any previous value and expiry
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Remove a key; absent keys are not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key).await
    }
}

/// Read and deserialize a JSON value
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> StoreResult<Option<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StoreError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// Serialize and write a JSON value
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value).map_err(|e| StoreError::Malformed {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.set(key, &raw, ttl).await
}

/// Namespacing for every key the engine writes
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn session(&self, guest_id: &str) -> String {
        format!("{}:session:{guest_id}", self.prefix)
    }

    pub fn roster(&self, roster_id: &str) -> String {
        format!("{}:roster:{roster_id}", self.prefix)
    }

    pub fn playlist_list(&self) -> String {
        format!("{}:playlist:list", self.prefix)
    }

    pub fn playlist_index(&self) -> String {
        format!("{}:playlist:index", self.prefix)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("concierge")
    }
}
