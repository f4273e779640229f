//! Checkpoint admin rosters
//!
//! Two independent sets of operator phone numbers. A roster that was never
//! written reads as the configured seed; an emptied roster stays empty.
//! Every write refreshes the roster's TTL.

use crate::state_machine::Checkpoint;
use crate::store::{get_json, set_json, KeySpace, KvStore, StoreResult};
use crate::transport::{OutboundMessage, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct AdminRosters {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    ttl: Duration,
    seed: Vec<String>,
    /// Serializes read-modify-write across guests within this process
    write_lock: Mutex<()>,
}

impl AdminRosters {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace, ttl: Duration, seed: Vec<String>) -> Self {
        Self {
            store,
            keys,
            ttl,
            seed,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn members(&self, checkpoint: Checkpoint) -> StoreResult<Vec<String>> {
        let key = self.keys.roster(checkpoint.roster_id());
        let members: Option<Vec<String>> = get_json(self.store.as_ref(), &key).await?;
        Ok(members.unwrap_or_else(|| self.seed.clone()))
    }

    async fn write(&self, checkpoint: Checkpoint, members: &[String]) -> StoreResult<()> {
        let key = self.keys.roster(checkpoint.roster_id());
        set_json(self.store.as_ref(), &key, members, Some(self.ttl)).await
    }

    /// Add a member; returns the roster afterwards
    pub async fn add(
        &self,
        checkpoint: Checkpoint,
        phone_number: &str,
    ) -> StoreResult<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let mut members = self.members(checkpoint).await?;
        if !members.iter().any(|m| m == phone_number) {
            members.push(phone_number.to_string());
        }
        self.write(checkpoint, &members).await?;
        tracing::info!(checkpoint = %checkpoint, phone = %phone_number, size = members.len(), "Roster member added");
        Ok(members)
    }

    /// Remove a number from every roster it belongs to
    pub async fn remove(&self, phone_number: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        for checkpoint in Checkpoint::ALL {
            let mut members = self.members(checkpoint).await?;
            let before = members.len();
            members.retain(|m| m != phone_number);
            if members.len() != before {
                self.write(checkpoint, &members).await?;
                tracing::info!(checkpoint = %checkpoint, phone = %phone_number, "Roster member removed");
            }
        }
        Ok(())
    }

    /// Send a text to every member in turn
    ///
    /// Individual send failures are logged and skipped; only failing to read
    /// the roster is an error.
    pub async fn broadcast(
        &self,
        checkpoint: Checkpoint,
        transport: &dyn Transport,
        message: &str,
    ) -> StoreResult<()> {
        let members = self.members(checkpoint).await?;
        for member in &members {
            if let Err(e) = transport
                .send(&OutboundMessage::text(member, message))
                .await
            {
                tracing::warn!(checkpoint = %checkpoint, recipient = %member, error = %e, "Roster notification failed");
            }
        }
        tracing::debug!(checkpoint = %checkpoint, recipients = members.len(), "Roster broadcast finished");
        Ok(())
    }
}
