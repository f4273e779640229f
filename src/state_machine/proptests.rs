//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::{match_rule, RULES};
use super::*;
use crate::registry::Guest;
use crate::transport::{Attachment, MediaAttachment, MediaKind};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(features: Features) -> SessionContext {
    SessionContext::new(
        Guest::new("g-1", "+6281100001", "Bapak Agus").with_headcount(2),
        "+6281100001",
        features,
    )
}

/// The guest hears back, now or once the effect's outcome is fed back
fn responds(result: &TransitionResult) -> bool {
    result.effects.iter().any(|effect| match effect {
        Effect::Reply { .. }
        | Effect::SendQrImage
        | Effect::UpdateHeadcount { .. }
        | Effect::StoreMedia { .. }
        | Effect::DecodeQr { .. }
        | Effect::CheckIn { .. }
        | Effect::JoinRoster { .. }
        | Effect::LeaveRosters
        | Effect::ResetPlaylist
        | Effect::BroadcastReminder => true,
        Effect::PersistState
        | Effect::ClearState
        | Effect::InjectPlaylist { .. }
        | Effect::NotifyCheckpoint { .. } => false,
    })
}

fn only_reply(result: &TransitionResult) -> Option<&str> {
    match &result.effects[..] {
        [Effect::Reply { text, .. }] => Some(text.as_str()),
        _ => None,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = ConversationState> {
    prop::sample::select(ConversationState::ALL.to_vec())
}

fn arb_awaiting_state() -> impl Strategy<Value = ConversationState> {
    prop::sample::select(
        ConversationState::ALL
            .into_iter()
            .filter(|s| *s != ConversationState::Idle)
            .collect::<Vec<_>>(),
    )
}

fn arb_features() -> impl Strategy<Value = Features> {
    (any::<bool>(), any::<bool>()).prop_map(|(operations_commands, broadcast_mode)| Features {
        operations_commands,
        broadcast_mode,
    })
}

fn arb_command() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "0",
        "1",
        "2",
        "3",
        "23",
        "AT 1",
        "AT 2",
        "NAT",
        "Konfirmasi QR 1",
        "Konfirmasi QR 2",
        "1819",
        "2306",
        "Broadcast Reminder Ucapans",
    ])
    .prop_map(str::to_string)
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![arb_command(), "[0-9]{1,4}", "[a-zA-Z ]{0,20}", ".{0,30}"]
}

fn arb_attachment() -> impl Strategy<Value = Option<Attachment>> {
    prop_oneof![
        Just(None),
        Just(Some(Attachment {
            kind: MediaKind::Image,
            media: MediaAttachment::inline("image/jpeg", b"jpg"),
        })),
        Just(Some(Attachment {
            kind: MediaKind::Video,
            media: MediaAttachment::inline("video/mp4", b"mp4"),
        })),
    ]
}

fn arb_input() -> impl Strategy<Value = GuestInput> {
    (arb_text(), arb_attachment()).prop_map(|(text, attachment)| GuestInput { text, attachment })
}

fn arb_non_count_text() -> impl Strategy<Value = String> {
    ".{0,20}".prop_filter("must not be a headcount or cancel", |s| {
        s != "0" && !s.trim().parse::<u32>().is_ok_and(|n| n > 0)
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Every state/input combination answers the guest
    #[test]
    fn prop_transition_is_total(
        state in arb_state(),
        features in arb_features(),
        input in arb_input(),
    ) {
        let result = transition(state, &test_context(features), Event::Input(input));
        prop_assert!(responds(&result), "no response for {state:?}");
    }

    /// Input alone never leaves a waiting state for another waiting state
    #[test]
    fn prop_waiting_states_only_exit_to_idle(
        state in arb_awaiting_state(),
        input in arb_input(),
    ) {
        let result = transition(state, &test_context(Features::default()), Event::Input(input));
        prop_assert!(
            result.new_state == state || result.new_state == ConversationState::Idle,
            "{state:?} moved to {:?}", result.new_state
        );
    }

    /// A non-numeric headcount re-prompts without touching the state
    #[test]
    fn prop_rsvp_reprompt_is_idempotent(text in arb_non_count_text()) {
        let ctx = test_context(Features::default());
        let state = ConversationState::AwaitingRsvpCount;

        let first = transition(state, &ctx, Event::Input(GuestInput::text(text.clone())));
        let second = transition(first.new_state, &ctx, Event::Input(GuestInput::text(text)));

        prop_assert_eq!(first.new_state, state);
        prop_assert_eq!(second.new_state, state);
        prop_assert_eq!(only_reply(&first), Some(replies::REPROMPT_HEADCOUNT));
        prop_assert_eq!(only_reply(&second), Some(replies::REPROMPT_HEADCOUNT));
    }

    /// "0" cancels every waiting state back to Idle
    #[test]
    fn prop_zero_cancels_every_waiting_state(
        state in arb_awaiting_state(),
        features in arb_features(),
    ) {
        let result = transition(state, &test_context(features), Event::Input(GuestInput::text("0")));
        prop_assert_eq!(result.new_state, ConversationState::Idle);
        prop_assert!(matches!(result.effects[0], Effect::ClearState));
        let cancelled = [
            replies::CANCELLED_HEADCOUNT,
            replies::CANCELLED_MEDIA,
            replies::CANCELLED_QR,
        ];
        let reply = match &result.effects[1] {
            Effect::Reply { text, .. } => text.as_str(),
            other => panic!("expected reply, got {other:?}"),
        };
        prop_assert!(cancelled.contains(&reply));
    }

    /// Failed effects never move the conversation
    #[test]
    fn prop_failures_preserve_state(
        state in arb_state(),
        failure in prop::sample::select(vec![
            Failure::InvalidSymbol,
            Failure::UnknownGuest,
            Failure::MediaDownload,
            Failure::MediaStorage,
            Failure::Registry,
            Failure::QrImageUnavailable,
            Failure::Store,
        ]),
    ) {
        let result = transition(state, &test_context(Features::default()), Event::EffectFailed { failure });
        prop_assert_eq!(result.new_state, state);
        let single_reply = matches!(
            result.effects[..],
            [Effect::Reply { kind: ReplyKind::Failure, .. }]
        );
        prop_assert!(single_reply, "unexpected effects {:?}", result.effects);
    }

    /// Text that is not a command never starts anything from Idle
    #[test]
    fn prop_idle_unknown_text_gets_help(text in "[a-z]{4,12}") {
        let result = transition(
            ConversationState::Idle,
            &test_context(Features { operations_commands: true, broadcast_mode: true }),
            Event::Input(GuestInput::text(text)),
        );
        prop_assert_eq!(result.new_state, ConversationState::Idle);
        let single_reply = matches!(
            result.effects[..],
            [Effect::Reply { kind: ReplyKind::Help, .. }]
        );
        prop_assert!(single_reply, "unexpected effects {:?}", result.effects);
    }
}

// ============================================================================
// Rule table coverage
// ============================================================================

#[test]
fn every_waiting_state_has_a_catch_all() {
    for state in ConversationState::ALL {
        if state == ConversationState::Idle {
            continue;
        }
        let input = GuestInput::text("anything at all");
        assert!(
            match_rule(state, Features::default(), &input).is_some(),
            "{state:?} has no catch-all rule"
        );
    }
}

#[test]
fn every_rule_is_reachable() {
    let all_on = Features {
        operations_commands: true,
        broadcast_mode: true,
    };
    let image = Attachment {
        kind: MediaKind::Image,
        media: MediaAttachment::inline("image/png", b"png"),
    };
    let mut inputs: Vec<GuestInput> = [
        "0",
        "1",
        "2",
        "3",
        "5",
        "23",
        "AT 1",
        "AT 2",
        "NAT",
        "Konfirmasi QR 1",
        "Konfirmasi QR 2",
        "1819",
        "2306",
        "Broadcast Reminder Ucapans",
        "halo",
    ]
    .into_iter()
    .map(GuestInput::text)
    .collect();
    inputs.push(GuestInput::attachment(image));

    let mut hit = vec![false; RULES.len()];
    for state in ConversationState::ALL {
        for input in &inputs {
            if let Some(rule) = match_rule(state, all_on, input) {
                let index = RULES
                    .iter()
                    .position(|r| std::ptr::eq(r, rule))
                    .unwrap();
                hit[index] = true;
            }
        }
    }

    for (index, reached) in hit.iter().enumerate() {
        assert!(reached, "rule {index} ({:?}) is shadowed", RULES[index].action);
    }
}
