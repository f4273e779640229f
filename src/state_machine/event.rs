//! Events that drive the conversation

use crate::registry::Guest;
use crate::state_machine::state::Checkpoint;
use crate::transport::{Attachment, MediaKind};

/// What the guest sent, after empty-body fallback
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GuestInput {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl GuestInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn attachment(attachment: Attachment) -> Self {
        Self {
            text: String::new(),
            attachment: Some(attachment),
        }
    }

    pub fn image(&self) -> Option<&Attachment> {
        self.attachment
            .as_ref()
            .filter(|a| a.kind == MediaKind::Image)
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Guest events
    Input(GuestInput),

    // Effect outcomes
    HeadcountUpdated {
        headcount: u32,
    },
    MediaStored {
        kind: MediaKind,
    },
    QrDecoded {
        guest_id: String,
    },
    CheckInCompleted {
        guest: Guest,
    },
    RosterJoined {
        checkpoint: Checkpoint,
        members: Vec<String>,
    },
    RostersLeft,
    PlaylistReset,
    /// Reminder job spawned; its summary arrives separately
    BroadcastStarted,
    BroadcastAlreadyRunning,
    EffectFailed {
        failure: Failure,
    },
}

/// Guest-visible classification of a failed effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Image held no readable QR symbol
    InvalidSymbol,
    /// QR decoded to an identifier the registry does not know
    UnknownGuest,
    /// Attachment could not be fetched from the gateway
    MediaDownload,
    MediaStorage,
    Registry,
    /// Guest's own QR ticket could not be loaded or sent
    QrImageUnavailable,
    Store,
}
