//! Session repository
//!
//! Per-guest conversation state in the volatile store. An absent or expired
//! key reads as `Idle`; clearing deletes the key outright.

use crate::state_machine::ConversationState;
use crate::store::{get_json, set_json, KeySpace, KvStore, StoreResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Typed access to per-guest session keys
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    ttl: Duration,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    pub async fn load(&self, guest_id: &str) -> StoreResult<ConversationState> {
        let state = get_json(self.store.as_ref(), &self.keys.session(guest_id)).await?;
        Ok(state.unwrap_or_default())
    }

    /// Overwrite the state and restart its idle timeout
    pub async fn save(&self, guest_id: &str, state: &ConversationState) -> StoreResult<()> {
        if matches!(state, ConversationState::Idle) {
            return self.clear(guest_id).await;
        }
        set_json(
            self.store.as_ref(),
            &self.keys.session(guest_id),
            state,
            Some(self.ttl),
        )
        .await
    }

    pub async fn clear(&self, guest_id: &str) -> StoreResult<()> {
        self.store.delete(&self.keys.session(guest_id)).await
    }
}

/// One async mutex per key, created on demand
///
/// Messages from the same guest are handled one at a time while different
/// guests proceed in parallel. Idle entries are pruned on each acquisition.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|k, m| k == key || Arc::strong_count(m) > 1);
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
