//! HTTP API for the guest concierge
//!
//! Inbound message webhook, the display screen's playlist cursor and a
//! health check.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::playlist::Playlist;
use crate::runtime::Dispatcher;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub playlist: Arc<Playlist>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, playlist: Arc<Playlist>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            playlist,
        }
    }
}
