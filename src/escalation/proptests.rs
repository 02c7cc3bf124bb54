//! Property-based tests for the escalation state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::catalog::{CatalogName, VariantIndex};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = EscalationState> {
    prop_oneof![
        Just(EscalationState::Normal),
        (1u32..MAX_FALLBACK).prop_map(|count| EscalationState::Retrying { count }),
        Just(EscalationState::Terminated),
    ]
}

fn arb_handled_catalog() -> impl Strategy<Value = CatalogName> {
    prop_oneof![
        Just(CatalogName::Welcome),
        Just(CatalogName::GeneralFallback),
        Just(CatalogName::FinalFallback),
    ]
}

fn arb_event() -> impl Strategy<Value = EscalationEvent> {
    prop_oneof![
        arb_handled_catalog().prop_map(|catalog| EscalationEvent::IntentHandled { catalog }),
        Just(EscalationEvent::Fallback),
    ]
}

// ============================================================================
// Helpers
// ============================================================================

fn replies(result: &TransitionResult) -> Vec<(CatalogName, VariantIndex, bool)> {
    result
        .effects
        .iter()
        .filter_map(|effect| match *effect {
            Effect::Reply {
                catalog,
                index,
                expect_more_input,
            } => Some((catalog, index, expect_more_input)),
            Effect::PersistCount { .. } => None,
        })
        .collect()
}

fn persisted(result: &TransitionResult) -> Vec<(u32, u32)> {
    result
        .effects
        .iter()
        .filter_map(|effect| match *effect {
            Effect::PersistCount {
                fallback_count,
                lifespan,
            } => Some((fallback_count, lifespan)),
            Effect::Reply { .. } => None,
        })
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Every transition replies once and writes the counter once, refreshing the lifespan
    #[test]
    fn prop_one_reply_one_write(state in arb_state(), event in arb_event()) {
        let result = transition(state, event);
        prop_assert_eq!(replies(&result).len(), 1);
        let writes = persisted(&result);
        prop_assert_eq!(writes.len(), 1);
        prop_assert_eq!(writes[0].1, CONTEXT_LIFESPAN);
    }

    /// The persisted counter always matches the state it classifies as
    #[test]
    fn prop_persisted_count_matches_new_state(state in arb_state(), event in arb_event()) {
        let result = transition(state, event);
        let (count, _) = persisted(&result)[0];
        prop_assert_eq!(count, result.new_state.fallback_count());
    }

    /// A handled intent resets to Normal from anywhere
    #[test]
    fn prop_handled_intent_resets(state in arb_state(), catalog in arb_handled_catalog()) {
        let result = transition(state, EscalationEvent::IntentHandled { catalog });
        prop_assert_eq!(result.new_state, EscalationState::Normal);
        prop_assert_eq!(persisted(&result)[0].0, 0);
        prop_assert_eq!(replies(&result)[0], (catalog, VariantIndex::Random, true));
    }

    /// Below the ceiling a miss retries with the variant for the current count
    #[test]
    fn prop_miss_below_ceiling_retries(count in 0u32..MAX_FALLBACK) {
        let result = transition(EscalationState::from_count(count), EscalationEvent::Fallback);
        prop_assert_eq!(result.new_state, EscalationState::from_count(count + 1));
        prop_assert_eq!(persisted(&result)[0].0, count + 1);
        prop_assert_eq!(
            replies(&result)[0],
            (CatalogName::GeneralFallback, VariantIndex::Cycle(count as usize), true)
        );
    }

    /// At or past the ceiling a miss ends the conversation and clears the counter
    #[test]
    fn prop_miss_at_ceiling_terminates(count in MAX_FALLBACK..1000) {
        let state = EscalationState::from_count(count);
        prop_assert!(state.is_terminal());
        let result = transition(state, EscalationEvent::Fallback);
        prop_assert_eq!(result.new_state, EscalationState::Normal);
        prop_assert_eq!(persisted(&result)[0].0, 0);
        let (catalog, _, expect_more_input) = replies(&result)[0];
        prop_assert_eq!(catalog, CatalogName::FinalFallback);
        prop_assert!(!expect_more_input);
    }

    /// Only a miss in the terminated state stops expecting input
    #[test]
    fn prop_closing_reply_iff_terminated(state in arb_state(), event in arb_event()) {
        let result = transition(state, event);
        let (_, _, expect_more_input) = replies(&result)[0];
        let closes = state.is_terminal() && event == EscalationEvent::Fallback;
        prop_assert_eq!(expect_more_input, !closes);
    }

    /// Within a run of misses the counter never decreases until termination resets it
    #[test]
    fn prop_counter_monotonic_within_miss_run(start in 0u32..MAX_FALLBACK, misses in 1usize..10) {
        let mut state = EscalationState::from_count(start);
        let mut previous = start;
        for _ in 0..misses {
            let result = transition(state, EscalationEvent::Fallback);
            let (count, _) = persisted(&result)[0];
            let (_, _, expect_more_input) = replies(&result)[0];
            if !expect_more_input {
                prop_assert_eq!(previous, MAX_FALLBACK);
                prop_assert_eq!(count, 0);
                break;
            }
            prop_assert_eq!(count, previous + 1);
            previous = count;
            // The store round-trips only the counter
            state = EscalationState::from_count(count);
        }
    }

    /// Replaying an event sequence from a stored counter is deterministic
    #[test]
    fn prop_transition_is_pure(state in arb_state(), events in proptest::collection::vec(arb_event(), 0..12)) {
        let run = |mut state: EscalationState| {
            let mut trace = Vec::new();
            for event in &events {
                let result = transition(state, *event);
                state = result.new_state;
                trace.push(result);
            }
            trace
        };
        prop_assert_eq!(run(state), run(state));
    }
}
