//! Effects produced by state transitions

use crate::registry::Guest;
use crate::state_machine::state::Checkpoint;
use crate::transport::Attachment;

/// How a reply relates to the guest's input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Prompt, confirmation or result
    Normal,
    /// Nothing matched the input
    Help,
    /// An effect failed
    Failure,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Send a text back to the sender
    Reply { text: String, kind: ReplyKind },

    /// Persist the new state with a fresh idle timeout
    PersistState,

    /// Remove the session key
    ClearState,

    /// Send the guest's stored QR ticket
    SendQrImage,

    UpdateHeadcount { headcount: u32 },

    /// Download an attachment and keep it in media storage
    StoreMedia { attachment: Attachment },

    /// Download an image and decode its QR symbol
    DecodeQr { attachment: Attachment },

    /// Resolve the scanned guest and confirm attendance
    CheckIn { guest_id: String },

    /// Splice the guest's media into the playlist, if configured
    InjectPlaylist { guest_id: String },

    /// Tell a checkpoint's operators who just arrived
    NotifyCheckpoint { checkpoint: Checkpoint, guest: Guest },

    /// Add the sender to a checkpoint roster
    JoinRoster { checkpoint: Checkpoint },

    /// Remove the sender from every roster
    LeaveRosters,

    ResetPlaylist,

    /// Send the reminder sequence to every registered guest
    BroadcastReminder,
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply {
            text: text.into(),
            kind: ReplyKind::Normal,
        }
    }

    pub fn help(text: impl Into<String>) -> Self {
        Effect::Reply {
            text: text.into(),
            kind: ReplyKind::Help,
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Effect::Reply {
            text: text.into(),
            kind: ReplyKind::Failure,
        }
    }
}
