//! Conversation dispatcher
//!
//! One call per inbound message. Messages from the same guest are serialized
//! through [`KeyedLocks`]; different guests run concurrently.

use super::reminder::{BroadcastSlot, ReminderJob};
use super::{DispatchOutcome, EngineError};
use crate::config::ReminderSettings;
use crate::media::{mime_for, MediaFolder, MediaStorage};
use crate::playlist::Playlist;
use crate::qr::QrDecoder;
use crate::registry::GuestRegistry;
use crate::roster::AdminRosters;
use crate::session::{KeyedLocks, SessionRepository};
use crate::state_machine::{
    replies, transition, ConversationState, Effect, Event, Failure, Features, GuestInput,
    ReplyKind, SessionContext,
};
use crate::transport::{
    normalize_phone, Attachment, InboundMessage, MediaKind, MediaPayload, OutboundMessage,
    Transport,
};
use std::sync::Arc;

pub struct Dispatcher {
    registry: Arc<dyn GuestRegistry>,
    transport: Arc<dyn Transport>,
    media: Arc<dyn MediaStorage>,
    decoder: Arc<dyn QrDecoder>,
    sessions: SessionRepository,
    rosters: Arc<AdminRosters>,
    playlist: Arc<Playlist>,
    locks: KeyedLocks,
    features: Features,
    reminder: ReminderSettings,
    broadcasts: BroadcastSlot,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn GuestRegistry>,
        transport: Arc<dyn Transport>,
        media: Arc<dyn MediaStorage>,
        decoder: Arc<dyn QrDecoder>,
        sessions: SessionRepository,
        rosters: Arc<AdminRosters>,
        playlist: Arc<Playlist>,
        features: Features,
        reminder: ReminderSettings,
    ) -> Self {
        Self {
            registry,
            transport,
            media,
            decoder,
            sessions,
            rosters,
            playlist,
            locks: KeyedLocks::new(),
            features,
            reminder,
            broadcasts: BroadcastSlot::default(),
        }
    }

    /// Handle one inbound message. Never fails: every error path has already
    /// answered the guest and is reported in the outcome for logging.
    pub async fn handle(&self, message: InboundMessage) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        if message.from_me {
            return outcome;
        }

        let sender = normalize_phone(&message.sender);
        let guest = match self.registry.find_by_phone(&sender).await {
            Ok(Some(guest)) => guest,
            Ok(None) => {
                tracing::info!(sender = %sender, "Message from unregistered number");
                self.send_reply(&sender, replies::NOT_REGISTERED, &mut outcome)
                    .await;
                outcome.record(EngineError::NotRegistered(sender));
                return outcome;
            }
            Err(e) => {
                self.send_reply(&sender, replies::GENERIC_ERROR, &mut outcome)
                    .await;
                outcome.record(e.into());
                return outcome;
            }
        };

        let _guard = self.locks.lock(&guest.id).await;

        let state = match self.sessions.load(&guest.id).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(guest_id = %guest.id, error = %e, "Session unreadable, treating as idle");
                outcome.record(e.into());
                ConversationState::Idle
            }
        };

        let Some(input) = resolve_input(&message, state) else {
            self.send_reply(&sender, replies::TECHNICAL_ERROR, &mut outcome)
                .await;
            outcome.record(EngineError::UnreadableMessage);
            return outcome;
        };

        tracing::debug!(guest_id = %guest.id, state = %state, text = %input.text, "Dispatching guest input");
        let context = SessionContext::new(guest, sender, self.features);
        self.process(state, &context, Event::Input(input), &mut outcome)
            .await;
        outcome
    }

    /// Run an event and every outcome event its effects produce
    async fn process(
        &self,
        initial: ConversationState,
        context: &SessionContext,
        event: Event,
        outcome: &mut DispatchOutcome,
    ) {
        let mut state = initial;
        let mut events = vec![event];

        while let Some(current) = events.pop() {
            let result = transition(state, context, current);
            let old_state = std::mem::replace(&mut state, result.new_state);
            if old_state != state {
                tracing::info!(guest_id = %context.guest.id, from = %old_state, to = %state, "State changed");
            }

            for effect in result.effects {
                if let Some(next) = self.execute_effect(effect, state, context, outcome).await {
                    // A failed effect voids the rest of this transition
                    let failed = matches!(next, Event::EffectFailed { .. });
                    events.push(next);
                    if failed {
                        break;
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn execute_effect(
        &self,
        effect: Effect,
        state: ConversationState,
        context: &SessionContext,
        outcome: &mut DispatchOutcome,
    ) -> Option<Event> {
        let guest_id = context.guest.id.as_str();
        match effect {
            Effect::Reply { text, kind } => {
                if kind == ReplyKind::Help {
                    outcome.record(EngineError::UnrecognizedInput);
                }
                self.send_reply(&context.sender, &text, outcome).await;
                None
            }

            Effect::PersistState => match self.sessions.save(guest_id, &state).await {
                Ok(()) => None,
                Err(e) => {
                    outcome.record(e.into());
                    Some(failed(Failure::Store))
                }
            },

            // The key would expire on its own, so a failed delete is only logged
            Effect::ClearState => {
                if let Err(e) = self.sessions.clear(guest_id).await {
                    outcome.record(e.into());
                }
                None
            }

            Effect::SendQrImage => match self.send_qr_image(context).await {
                Ok(message) => {
                    outcome.replies.push(message);
                    None
                }
                Err(e) => {
                    outcome.record(e);
                    Some(failed(Failure::QrImageUnavailable))
                }
            },

            Effect::UpdateHeadcount { headcount } => {
                match self.registry.update_headcount(guest_id, headcount).await {
                    Ok(()) => {
                        tracing::info!(guest_id = %guest_id, headcount, "Headcount updated");
                        Some(Event::HeadcountUpdated { headcount })
                    }
                    Err(e) => {
                        outcome.record(e.into());
                        Some(failed(Failure::Registry))
                    }
                }
            }

            Effect::StoreMedia { attachment } => {
                let bytes = match self.transport.download(&attachment.media).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        outcome.record(e.into());
                        return Some(failed(Failure::MediaDownload));
                    }
                };
                let folder = match attachment.kind {
                    MediaKind::Image => MediaFolder::Images,
                    MediaKind::Video => MediaFolder::Videos,
                };
                match self
                    .media
                    .save(folder, &attachment.media.mime_type, &bytes)
                    .await
                {
                    Ok(file_name) => {
                        tracing::info!(guest_id = %guest_id, file = %file_name, "Stored guest media");
                        Some(Event::MediaStored {
                            kind: attachment.kind,
                        })
                    }
                    Err(e) => {
                        outcome.record(e.into());
                        Some(failed(Failure::MediaStorage))
                    }
                }
            }

            Effect::DecodeQr { attachment } => Some(self.decode_qr(&attachment, outcome).await),

            Effect::CheckIn { guest_id: scanned } => {
                let mut guest = match self.registry.find_by_id(&scanned).await {
                    Ok(Some(guest)) => guest,
                    Ok(None) => {
                        outcome.record(EngineError::InvalidSymbol(format!(
                            "unknown guest id {scanned:?}"
                        )));
                        return Some(failed(Failure::UnknownGuest));
                    }
                    Err(e) => {
                        outcome.record(e.into());
                        return Some(failed(Failure::Registry));
                    }
                };
                if let Err(e) = self.registry.set_attendance_confirmed(&guest.id).await {
                    outcome.record(e.into());
                    return Some(failed(Failure::Registry));
                }
                guest.attendance_confirmed = true;
                tracing::info!(
                    guest_id = %guest.id,
                    scanned_by = %context.sender,
                    checkpoint = ?state.checkpoint(),
                    "Guest checked in"
                );
                Some(Event::CheckInCompleted { guest })
            }

            // Injection is best effort; the guest is already checked in
            Effect::InjectPlaylist { guest_id: scanned } => {
                if let Err(e) = self.playlist.inject(&scanned).await {
                    outcome.record(e.into());
                }
                None
            }

            Effect::NotifyCheckpoint { checkpoint, guest } => {
                let notice = replies::checkpoint_notice(&guest);
                if let Err(e) = self
                    .rosters
                    .broadcast(checkpoint, self.transport.as_ref(), &notice)
                    .await
                {
                    outcome.record(e.into());
                }
                None
            }

            Effect::JoinRoster { checkpoint } => {
                match self.rosters.add(checkpoint, &context.sender).await {
                    Ok(members) => Some(Event::RosterJoined {
                        checkpoint,
                        members,
                    }),
                    Err(e) => {
                        outcome.record(e.into());
                        Some(failed(Failure::Store))
                    }
                }
            }

            Effect::LeaveRosters => match self.rosters.remove(&context.sender).await {
                Ok(()) => Some(Event::RostersLeft),
                Err(e) => {
                    outcome.record(e.into());
                    Some(failed(Failure::Store))
                }
            },

            Effect::ResetPlaylist => match self.playlist.reset().await {
                Ok(()) => Some(Event::PlaylistReset),
                Err(e) => {
                    outcome.record(e.into());
                    Some(failed(Failure::Store))
                }
            },

            // Detached; the operator gets the summary when the job ends
            Effect::BroadcastReminder => {
                let Some(claim) = self.broadcasts.try_claim() else {
                    tracing::info!(requested_by = %context.sender, "Reminder broadcast already running");
                    return Some(Event::BroadcastAlreadyRunning);
                };
                tracing::info!(requested_by = %context.sender, "Reminder broadcast requested");
                ReminderJob {
                    registry: Arc::clone(&self.registry),
                    transport: Arc::clone(&self.transport),
                    media: Arc::clone(&self.media),
                    settings: self.reminder.clone(),
                    operator: context.sender.clone(),
                }
                .spawn(claim);
                Some(Event::BroadcastStarted)
            }
        }
    }

    async fn send_reply(&self, to: &str, text: &str, outcome: &mut DispatchOutcome) {
        let message = OutboundMessage::text(to, text);
        if let Err(e) = self.transport.send(&message).await {
            outcome.record(e.into());
        }
        outcome.replies.push(message);
    }

    async fn send_qr_image(
        &self,
        context: &SessionContext,
    ) -> Result<OutboundMessage, EngineError> {
        let Some(file_name) = context.guest.qr_image.as_deref() else {
            return Err(EngineError::Media(crate::media::MediaError::NotFound(
                format!("no QR ticket recorded for guest {}", context.guest.id),
            )));
        };
        let data = self.media.load(MediaFolder::QrCodes, file_name).await?;
        let message = OutboundMessage::Media {
            to: context.sender.clone(),
            payload: MediaPayload {
                kind: MediaKind::Image,
                file_name: file_name.to_string(),
                mime_type: mime_for(file_name),
                data,
            },
            caption: replies::QR_CAPTION.to_string(),
        };
        self.transport.send(&message).await?;
        Ok(message)
    }

    async fn decode_qr(&self, attachment: &Attachment, outcome: &mut DispatchOutcome) -> Event {
        let bytes = match self.transport.download(&attachment.media).await {
            Ok(bytes) => bytes,
            Err(e) => {
                outcome.record(e.into());
                return failed(Failure::MediaDownload);
            }
        };

        let decoder = Arc::clone(&self.decoder);
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&bytes)).await;
        match decoded {
            Ok(Ok(payload)) => {
                let guest_id = payload.trim();
                if guest_id.is_empty() {
                    outcome.record(EngineError::InvalidSymbol("empty payload".to_string()));
                    return failed(Failure::InvalidSymbol);
                }
                Event::QrDecoded {
                    guest_id: guest_id.to_string(),
                }
            }
            Ok(Err(e)) => {
                outcome.record(EngineError::InvalidSymbol(e.to_string()));
                failed(Failure::InvalidSymbol)
            }
            Err(e) => {
                outcome.record(EngineError::InvalidSymbol(format!(
                    "decoder task failed: {e}"
                )));
                failed(Failure::InvalidSymbol)
            }
        }
    }
}

fn failed(failure: Failure) -> Event {
    Event::EffectFailed { failure }
}

/// Normalize the message body for the state machine
///
/// Text is trimmed. An empty body outside attachment states falls back to
/// the quoted text; with no quoted text either, the message is unreadable.
fn resolve_input(message: &InboundMessage, state: ConversationState) -> Option<GuestInput> {
    let mut text = message
        .text
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_string();
    if text.is_empty() && !state.expects_attachment() {
        text = message.quoted_text.as_deref()?.trim().to_string();
    }
    Some(GuestInput {
        text,
        attachment: message.attachment(),
    })
}
