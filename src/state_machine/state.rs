//! Conversation state types

use crate::registry::Guest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-guest conversation state, persisted between messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationState {
    /// No multi-turn exchange in progress
    #[default]
    Idle,

    /// Waiting for the new planned headcount
    AwaitingRsvpCount,

    /// Waiting for a congratulation photo or video
    AwaitingMediaUpload,

    /// Waiting for a QR ticket at the generic check-in desk
    AwaitingQrCode,

    AwaitingQrCodeCheckpointA,

    AwaitingQrCodeCheckpointB,
}

impl ConversationState {
    pub const ALL: [ConversationState; 6] = [
        ConversationState::Idle,
        ConversationState::AwaitingRsvpCount,
        ConversationState::AwaitingMediaUpload,
        ConversationState::AwaitingQrCode,
        ConversationState::AwaitingQrCodeCheckpointA,
        ConversationState::AwaitingQrCodeCheckpointB,
    ];

    /// Checkpoint whose roster is notified on a successful scan
    pub fn checkpoint(self) -> Option<Checkpoint> {
        match self {
            ConversationState::AwaitingQrCodeCheckpointA => Some(Checkpoint::A),
            ConversationState::AwaitingQrCodeCheckpointB => Some(Checkpoint::B),
            _ => None,
        }
    }

    pub fn is_awaiting_qr(self) -> bool {
        matches!(
            self,
            ConversationState::AwaitingQrCode
                | ConversationState::AwaitingQrCodeCheckpointA
                | ConversationState::AwaitingQrCodeCheckpointB
        )
    }

    /// States that expect an attachment; an empty text body there falls
    /// back to the quoted text instead of being rejected
    pub fn expects_attachment(self) -> bool {
        self == ConversationState::AwaitingMediaUpload || self.is_awaiting_qr()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingRsvpCount => "awaiting_rsvp_count",
            ConversationState::AwaitingMediaUpload => "awaiting_media_upload",
            ConversationState::AwaitingQrCode => "awaiting_qr_code",
            ConversationState::AwaitingQrCodeCheckpointA => "awaiting_qr_code_checkpoint_a",
            ConversationState::AwaitingQrCodeCheckpointB => "awaiting_qr_code_checkpoint_b",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical check-in point with its own admin roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    A,
    B,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 2] = [Checkpoint::A, Checkpoint::B];

    /// Name the operators use in chat
    pub fn label(self) -> &'static str {
        match self {
            Checkpoint::A => "AT 1",
            Checkpoint::B => "AT 2",
        }
    }

    /// Roster identifier within the key space
    pub fn roster_id(self) -> &'static str {
        match self {
            Checkpoint::A => "a",
            Checkpoint::B => "b",
        }
    }

    pub const fn awaiting_state(self) -> ConversationState {
        match self {
            Checkpoint::A => ConversationState::AwaitingQrCodeCheckpointA,
            Checkpoint::B => ConversationState::AwaitingQrCodeCheckpointB,
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Commands switched on by deployment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Features {
    /// Generic QR desk and playlist reset
    pub operations_commands: bool,
    /// Reminder broadcast trigger
    pub broadcast_mode: bool,
}

/// Everything the transition function may read besides the state
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub guest: Guest,
    /// Normalized phone number the message came from
    pub sender: String,
    pub features: Features,
}

impl SessionContext {
    pub fn new(guest: Guest, sender: impl Into<String>, features: Features) -> Self {
        Self {
            guest,
            sender: sender.into(),
            features,
        }
    }
}
