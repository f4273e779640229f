//! Pure state transition function
//!
//! Guest input is matched against [`RULES`] in order: the first rule whose
//! state filter, input filter and gate all accept wins. Idle input that no
//! rule accepts gets the help menu. Effect outcomes come back as events and
//! are handled directly below.

use super::effect::Effect;
use super::event::{Event, Failure, GuestInput};
use super::replies;
use super::state::{Checkpoint, ConversationState, Features, SessionContext};
use crate::transport::MediaKind;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

// ============================================================================
// Rule table
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub(crate) enum StateFilter {
    Is(ConversationState),
    AwaitingQr,
}

impl StateFilter {
    fn accepts(self, state: ConversationState) -> bool {
        match self {
            StateFilter::Is(expected) => state == expected,
            StateFilter::AwaitingQr => state.is_awaiting_qr(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum InputFilter {
    /// Text equal to the literal, attachment or not
    Exact(&'static str),
    /// Text holding a headcount greater than zero
    PositiveCount,
    /// Image or video attachment
    Media,
    /// Image attachment
    Image,
    Any,
}

impl InputFilter {
    fn accepts(self, input: &GuestInput) -> bool {
        match self {
            InputFilter::Exact(literal) => input.text == literal,
            // Zero or signed-negative counts fall through and re-prompt
            InputFilter::PositiveCount => parse_headcount(&input.text).is_some(),
            InputFilter::Media => input.attachment.is_some(),
            InputFilter::Image => input.image().is_some(),
            InputFilter::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Always,
    OperationsCommands,
    BroadcastMode,
}

impl Gate {
    fn open(self, features: Features) -> bool {
        match self {
            Gate::Always => true,
            Gate::OperationsCommands => features.operations_commands,
            Gate::BroadcastMode => features.broadcast_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Enter a waiting state and prompt for its input
    Enter {
        next: ConversationState,
        prompt: &'static str,
    },
    Cancel(&'static str),
    Reprompt(&'static str),
    Summary,
    SendQr,
    UpdateHeadcount,
    StoreMedia,
    DecodeQr,
    JoinRoster(Checkpoint),
    LeaveRosters,
    ResetPlaylist,
    BroadcastReminder,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Rule {
    pub state: StateFilter,
    pub input: InputFilter,
    pub gate: Gate,
    pub action: Action,
}

const fn rule(state: StateFilter, input: InputFilter, action: Action) -> Rule {
    Rule {
        state,
        input,
        gate: Gate::Always,
        action,
    }
}

const fn gated(state: StateFilter, input: InputFilter, gate: Gate, action: Action) -> Rule {
    Rule {
        state,
        input,
        gate,
        action,
    }
}

use ConversationState as S;
use InputFilter as I;
use StateFilter::{AwaitingQr, Is};

pub(crate) static RULES: &[Rule] = &[
    // Headcount change
    rule(Is(S::AwaitingRsvpCount), I::Exact("0"), Action::Cancel(replies::CANCELLED_HEADCOUNT)),
    rule(Is(S::AwaitingRsvpCount), I::PositiveCount, Action::UpdateHeadcount),
    rule(Is(S::AwaitingRsvpCount), I::Any, Action::Reprompt(replies::REPROMPT_HEADCOUNT)),
    // Congratulation upload
    rule(Is(S::AwaitingMediaUpload), I::Media, Action::StoreMedia),
    rule(Is(S::AwaitingMediaUpload), I::Exact("0"), Action::Cancel(replies::CANCELLED_MEDIA)),
    rule(Is(S::AwaitingMediaUpload), I::Any, Action::Reprompt(replies::REPROMPT_MEDIA)),
    // QR check-in, all desks
    rule(AwaitingQr, I::Image, Action::DecodeQr),
    rule(AwaitingQr, I::Exact("0"), Action::Cancel(replies::CANCELLED_QR)),
    rule(AwaitingQr, I::Any, Action::Reprompt(replies::REPROMPT_QR)),
    // Idle command table
    rule(
        Is(S::Idle),
        I::Exact("1"),
        Action::Enter {
            next: S::AwaitingRsvpCount,
            prompt: replies::PROMPT_HEADCOUNT,
        },
    ),
    rule(Is(S::Idle), I::Exact("2"), Action::Summary),
    rule(Is(S::Idle), I::Exact("3"), Action::SendQr),
    rule(
        Is(S::Idle),
        I::Exact("23"),
        Action::Enter {
            next: S::AwaitingMediaUpload,
            prompt: replies::PROMPT_MEDIA,
        },
    ),
    rule(
        Is(S::Idle),
        I::Exact("Konfirmasi QR 1"),
        Action::Enter {
            next: Checkpoint::A.awaiting_state(),
            prompt: replies::PROMPT_QR,
        },
    ),
    rule(
        Is(S::Idle),
        I::Exact("Konfirmasi QR 2"),
        Action::Enter {
            next: Checkpoint::B.awaiting_state(),
            prompt: replies::PROMPT_QR,
        },
    ),
    rule(Is(S::Idle), I::Exact("AT 1"), Action::JoinRoster(Checkpoint::A)),
    rule(Is(S::Idle), I::Exact("AT 2"), Action::JoinRoster(Checkpoint::B)),
    rule(Is(S::Idle), I::Exact("NAT"), Action::LeaveRosters),
    gated(
        Is(S::Idle),
        I::Exact("1819"),
        Gate::OperationsCommands,
        Action::Enter {
            next: S::AwaitingQrCode,
            prompt: replies::PROMPT_QR,
        },
    ),
    gated(
        Is(S::Idle),
        I::Exact("2306"),
        Gate::OperationsCommands,
        Action::ResetPlaylist,
    ),
    gated(
        Is(S::Idle),
        I::Exact("Broadcast Reminder Ucapans"),
        Gate::BroadcastMode,
        Action::BroadcastReminder,
    ),
];

/// First rule accepting this state and input, if any
pub(crate) fn match_rule(
    state: ConversationState,
    features: Features,
    input: &GuestInput,
) -> Option<&'static Rule> {
    RULES.iter().find(|rule| {
        rule.state.accepts(state) && rule.gate.open(features) && rule.input.accepts(input)
    })
}

fn parse_headcount(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|count| *count > 0)
}

// ============================================================================
// Transition
// ============================================================================

/// Pure transition function
///
/// Total over every state and event: each call yields a reply, or an effect
/// whose outcome event yields one.
pub fn transition(
    state: ConversationState,
    context: &SessionContext,
    event: Event,
) -> TransitionResult {
    match event {
        Event::Input(input) => apply_input(state, context, &input),

        Event::HeadcountUpdated { headcount } => TransitionResult::new(S::Idle)
            .with_effect(Effect::ClearState)
            .with_effect(Effect::reply(replies::rsvp_updated(
                &context.guest.name,
                headcount,
            ))),

        Event::MediaStored { kind } => TransitionResult::new(S::Idle)
            .with_effect(Effect::ClearState)
            .with_effect(Effect::reply(replies::media_stored(kind))),

        Event::QrDecoded { guest_id } => {
            TransitionResult::new(state).with_effect(Effect::CheckIn { guest_id })
        }

        Event::CheckInCompleted { guest } => {
            let notify = state.checkpoint().map(|checkpoint| Effect::NotifyCheckpoint {
                checkpoint,
                guest: guest.clone(),
            });
            TransitionResult::new(S::Idle)
                .with_effect(Effect::ClearState)
                .with_effect(Effect::InjectPlaylist {
                    guest_id: guest.id.clone(),
                })
                .with_effect(Effect::reply(replies::welcome(&guest.name)))
                .with_effects(notify)
        }

        Event::RosterJoined {
            checkpoint,
            members,
        } => TransitionResult::new(state)
            .with_effect(Effect::reply(replies::roster_joined(checkpoint, &members))),

        Event::RostersLeft => {
            TransitionResult::new(state).with_effect(Effect::reply(replies::ROSTERS_LEFT))
        }

        Event::PlaylistReset => {
            TransitionResult::new(state).with_effect(Effect::reply(replies::PLAYLIST_RESET))
        }

        Event::BroadcastStarted => {
            TransitionResult::new(state).with_effect(Effect::reply(replies::BROADCAST_STARTED))
        }

        Event::BroadcastAlreadyRunning => {
            TransitionResult::new(state).with_effect(Effect::reply(replies::BROADCAST_IN_PROGRESS))
        }

        // Failures never move the conversation; the guest can simply retry
        Event::EffectFailed { failure } => {
            TransitionResult::new(state).with_effect(Effect::failure(failure_reply(failure)))
        }
    }
}

fn apply_input(
    state: ConversationState,
    context: &SessionContext,
    input: &GuestInput,
) -> TransitionResult {
    let Some(rule) = match_rule(state, context.features, input) else {
        return TransitionResult::new(state).with_effect(Effect::help(replies::HELP));
    };

    match rule.action {
        Action::Enter { next, prompt } => TransitionResult::new(next)
            .with_effect(Effect::PersistState)
            .with_effect(Effect::reply(prompt)),

        Action::Cancel(text) => TransitionResult::new(S::Idle)
            .with_effect(Effect::ClearState)
            .with_effect(Effect::reply(text)),

        Action::Reprompt(text) => TransitionResult::new(state).with_effect(Effect::reply(text)),

        Action::Summary => TransitionResult::new(state)
            .with_effect(Effect::reply(replies::rsvp_summary(&context.guest))),

        Action::SendQr => TransitionResult::new(state)
            .with_effect(Effect::reply(replies::QR_INTRO))
            .with_effect(Effect::SendQrImage),

        Action::UpdateHeadcount => match parse_headcount(&input.text) {
            Some(headcount) => {
                TransitionResult::new(state).with_effect(Effect::UpdateHeadcount { headcount })
            }
            None => TransitionResult::new(state)
                .with_effect(Effect::reply(replies::REPROMPT_HEADCOUNT)),
        },

        Action::StoreMedia => match &input.attachment {
            Some(attachment) => TransitionResult::new(state).with_effect(Effect::StoreMedia {
                attachment: attachment.clone(),
            }),
            None => TransitionResult::new(state)
                .with_effect(Effect::reply(replies::REPROMPT_MEDIA)),
        },

        Action::DecodeQr => match input.image() {
            Some(attachment) => TransitionResult::new(state).with_effect(Effect::DecodeQr {
                attachment: attachment.clone(),
            }),
            None => TransitionResult::new(state).with_effect(Effect::reply(replies::REPROMPT_QR)),
        },

        Action::JoinRoster(checkpoint) => {
            TransitionResult::new(state).with_effect(Effect::JoinRoster { checkpoint })
        }

        Action::LeaveRosters => TransitionResult::new(state).with_effect(Effect::LeaveRosters),

        Action::ResetPlaylist => TransitionResult::new(state).with_effect(Effect::ResetPlaylist),

        Action::BroadcastReminder => {
            TransitionResult::new(state).with_effect(Effect::BroadcastReminder)
        }
    }
}

fn failure_reply(failure: Failure) -> &'static str {
    match failure {
        Failure::InvalidSymbol | Failure::UnknownGuest => replies::QR_INVALID,
        Failure::MediaDownload => replies::MEDIA_DOWNLOAD_FAILED,
        Failure::MediaStorage => replies::MEDIA_STORE_FAILED,
        Failure::QrImageUnavailable => replies::QR_SEND_FAILED,
        Failure::Registry | Failure::Store => replies::GENERIC_ERROR,
    }
}
