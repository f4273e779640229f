//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

pub mod effect;
pub mod event;
pub mod replies;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, ReplyKind};
pub use event::{Event, Failure, GuestInput};
pub use state::{Checkpoint, ConversationState, Features, SessionContext};
pub use transition::{transition, TransitionResult};
