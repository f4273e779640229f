//! Runtime for executing conversations
//!
//! The dispatcher resolves the sender and their session, feeds guest input
//! through the pure transition function and executes the resulting effects
//! against the registry, store, media storage and transport.

mod dispatcher;
mod reminder;

#[cfg(test)]
pub mod testing;

pub use dispatcher::Dispatcher;

use crate::media::MediaError;
use crate::registry::RegistryError;
use crate::store::StoreError;
use crate::transport::{OutboundMessage, TransportError};
use thiserror::Error;

/// Everything that can go wrong while handling one inbound message
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Sender {0} is not registered")]
    NotRegistered(String),
    #[error("No rule matched the input")]
    UnrecognizedInput,
    #[error("Message carried neither text nor quoted text")]
    UnreadableMessage,
    #[error("Invalid QR code: {0}")]
    InvalidSymbol(String),
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("Registry failure: {0}")]
    Registry(#[from] RegistryError),
    #[error("Session store failure: {0}")]
    Store(#[from] StoreError),
    #[error("Media storage failure: {0}")]
    Media(#[from] MediaError),
}

impl EngineError {
    /// Guest mistakes, as opposed to infrastructure failures
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            EngineError::NotRegistered(_)
                | EngineError::UnrecognizedInput
                | EngineError::UnreadableMessage
                | EngineError::InvalidSymbol(_)
        )
    }
}

/// What handling one inbound message produced
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Messages sent back to the sender, in order
    pub replies: Vec<OutboundMessage>,
    /// Last error observed, if any; the guest has already been answered
    pub error: Option<EngineError>,
}

impl DispatchOutcome {
    fn record(&mut self, error: EngineError) {
        if error.is_user_facing() {
            tracing::debug!(error = %error, "Guest input rejected");
        } else {
            tracing::error!(error = %error, "Engine failure");
        }
        self.error = Some(error);
    }
}
