//! Playlist rotator
//!
//! A shared list of media URLs shown on the venue screen, with a cursor the
//! screen advances on every poll. Guests listed in the injection table get
//! their media spliced in so it is the next one served after they check in.

use crate::store::{get_json, set_json, KeySpace, KvStore, StoreResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Cursor position after an advance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistSnapshot {
    pub video_list: Vec<String>,
    pub current_index: usize,
    pub current_url: Option<String>,
}

pub struct Playlist {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    ttl: Duration,
    defaults: Vec<String>,
    /// Guest id -> media URL
    injections: HashMap<String, String>,
    write_lock: Mutex<()>,
}

impl Playlist {
    pub fn new(
        store: Arc<dyn KvStore>,
        keys: KeySpace,
        ttl: Duration,
        defaults: Vec<String>,
        injections: HashMap<String, String>,
    ) -> Self {
        Self {
            store,
            keys,
            ttl,
            defaults,
            injections,
            write_lock: Mutex::new(()),
        }
    }

    /// Stored list, seeding the defaults on first use
    async fn load_list(&self) -> StoreResult<Vec<String>> {
        let key = self.keys.playlist_list();
        match get_json::<Vec<String>>(self.store.as_ref(), &key).await? {
            Some(list) if !list.is_empty() => Ok(list),
            _ => {
                set_json(self.store.as_ref(), &key, &self.defaults, Some(self.ttl)).await?;
                Ok(self.defaults.clone())
            }
        }
    }

    async fn load_index(&self) -> StoreResult<Option<usize>> {
        get_json(self.store.as_ref(), &self.keys.playlist_index()).await
    }

    /// Move the cursor one step, wrapping at the end of the list
    pub async fn advance(&self) -> StoreResult<PlaylistSnapshot> {
        let _guard = self.write_lock.lock().await;
        let list = self.load_list().await?;
        let index = next_position(self.load_index().await?, list.len());

        set_json(
            self.store.as_ref(),
            &self.keys.playlist_index(),
            &index,
            Some(self.ttl),
        )
        .await?;

        Ok(PlaylistSnapshot {
            current_url: list.get(index).cloned(),
            current_index: index,
            video_list: list,
        })
    }

    /// Splice the guest's media in as the next item served
    ///
    /// Returns `false` when the guest has no injection rule. Earlier copies
    /// of the URL are removed so it appears once.
    pub async fn inject(&self, guest_id: &str) -> StoreResult<bool> {
        let Some(url) = self.injections.get(guest_id) else {
            return Ok(false);
        };

        let _guard = self.write_lock.lock().await;
        let list = self.load_list().await?;
        let next = next_position(self.load_index().await?, list.len());
        let (list, position) = splice(&list, next, url);

        set_json(
            self.store.as_ref(),
            &self.keys.playlist_list(),
            &list,
            Some(self.ttl),
        )
        .await?;

        // Re-anchor so the following advance lands on the injected item
        let index_key = self.keys.playlist_index();
        match position.checked_sub(1) {
            Some(anchor) => {
                set_json(self.store.as_ref(), &index_key, &anchor, Some(self.ttl)).await?;
            }
            None => self.store.delete(&index_key).await?,
        }

        tracing::info!(guest_id = %guest_id, url = %url, position, "Injected guest media into playlist");
        Ok(true)
    }

    /// Forget the list and cursor; the defaults return on next use
    pub async fn reset(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(&self.keys.playlist_list()).await?;
        self.store.delete(&self.keys.playlist_index()).await?;
        tracing::info!("Playlist reset");
        Ok(())
    }
}

/// Position an advance from `index` would land on
fn next_position(index: Option<usize>, len: usize) -> usize {
    match index {
        Some(i) if i + 1 < len => i + 1,
        _ => 0,
    }
}

/// New list with `url` moved to `at`, plus where it ended up
fn splice(list: &[String], at: usize, url: &str) -> (Vec<String>, usize) {
    let removed_before = list[..at.min(list.len())]
        .iter()
        .filter(|item| *item == url)
        .count();
    let mut rebuilt: Vec<String> = list.iter().filter(|item| *item != url).cloned().collect();
    let position = (at - removed_before).min(rebuilt.len());
    rebuilt.insert(position, url.to_string());
    (rebuilt, position)
}
