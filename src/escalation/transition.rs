//! Pure escalation transition function

use super::{Effect, EscalationEvent, EscalationState, MAX_FALLBACK};
use crate::catalog::{CatalogName, VariantIndex};

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_state: EscalationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: EscalationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Pure transition function
///
/// Given the same state and event it always yields the same result. Every
/// transition produces exactly one reply and one counter write.
pub fn transition(state: EscalationState, event: EscalationEvent) -> TransitionResult {
    match (state, event) {
        // Any matched intent clears the miss streak
        (_, EscalationEvent::IntentHandled { catalog }) => {
            TransitionResult::new(EscalationState::Normal)
                .with_effect(Effect::persist_count(0))
                .with_effect(Effect::ask(catalog, VariantIndex::Random))
        }

        // Normal + Fallback -> Retrying { 1 }
        (EscalationState::Normal, EscalationEvent::Fallback) => retry(0),

        // Retrying + Fallback -> Retrying { count + 1 }, or Terminated once
        // the budget is spent
        (EscalationState::Retrying { count }, EscalationEvent::Fallback)
            if count < MAX_FALLBACK =>
        {
            retry(count)
        }

        // Terminated + Fallback -> closing reply; the counter does not
        // survive, so a session that keeps talking starts over at Normal
        (EscalationState::Retrying { .. } | EscalationState::Terminated, EscalationEvent::Fallback) => {
            TransitionResult::new(EscalationState::Normal)
                .with_effect(Effect::close(CatalogName::FinalFallback, VariantIndex::Random))
                .with_effect(Effect::persist_count(0))
        }
    }
}

/// Prompt with the variant matching the current miss count, then record one more miss
fn retry(count: u32) -> TransitionResult {
    let next = count.saturating_add(1);
    TransitionResult::new(EscalationState::from_count(next))
        .with_effect(Effect::ask(
            CatalogName::GeneralFallback,
            VariantIndex::Cycle(count as usize),
        ))
        .with_effect(Effect::persist_count(next))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_of(result: &TransitionResult) -> (CatalogName, VariantIndex, bool) {
        result
            .effects
            .iter()
            .find_map(|effect| match *effect {
                Effect::Reply {
                    catalog,
                    index,
                    expect_more_input,
                } => Some((catalog, index, expect_more_input)),
                Effect::PersistCount { .. } => None,
            })
            .expect("transition must reply")
    }

    fn persisted_count(result: &TransitionResult) -> u32 {
        result
            .effects
            .iter()
            .find_map(|effect| match *effect {
                Effect::PersistCount { fallback_count, .. } => Some(fallback_count),
                Effect::Reply { .. } => None,
            })
            .expect("transition must persist")
    }

    #[test]
    fn test_welcome_resets_streak() {
        let result = transition(
            EscalationState::Retrying { count: 2 },
            EscalationEvent::IntentHandled {
                catalog: CatalogName::Welcome,
            },
        );

        assert_eq!(result.new_state, EscalationState::Normal);
        assert_eq!(persisted_count(&result), 0);
        assert_eq!(
            reply_of(&result),
            (CatalogName::Welcome, VariantIndex::Random, true)
        );
        assert!(result.effects.contains(&Effect::PersistCount {
            fallback_count: 0,
            lifespan: 4,
        }));
    }

    #[test]
    fn test_first_miss_uses_first_variant() {
        let result = transition(EscalationState::Normal, EscalationEvent::Fallback);

        assert_eq!(result.new_state, EscalationState::Retrying { count: 1 });
        assert_eq!(persisted_count(&result), 1);
        assert_eq!(
            reply_of(&result),
            (CatalogName::GeneralFallback, VariantIndex::Cycle(0), true)
        );
    }

    #[test]
    fn test_third_miss_still_retries_and_spends_the_budget() {
        let result = transition(
            EscalationState::Retrying { count: 2 },
            EscalationEvent::Fallback,
        );

        assert_eq!(result.new_state, EscalationState::Terminated);
        assert_eq!(persisted_count(&result), 3);
        assert_eq!(
            reply_of(&result),
            (CatalogName::GeneralFallback, VariantIndex::Cycle(2), true)
        );
    }

    #[test]
    fn test_miss_when_terminated_closes_and_resets() {
        let result = transition(EscalationState::Terminated, EscalationEvent::Fallback);

        assert_eq!(result.new_state, EscalationState::Normal);
        assert_eq!(persisted_count(&result), 0);
        let (catalog, _, expect_more_input) = reply_of(&result);
        assert_eq!(catalog, CatalogName::FinalFallback);
        assert!(!expect_more_input);
    }

    #[test]
    fn test_unclassified_counts_past_the_ceiling_close() {
        let result = transition(
            EscalationState::Retrying { count: 17 },
            EscalationEvent::Fallback,
        );
        assert_eq!(reply_of(&result).0, CatalogName::FinalFallback);
        assert_eq!(result.new_state, EscalationState::Normal);
    }

    #[test]
    fn test_welcome_from_terminated_resets() {
        let result = transition(
            EscalationState::Terminated,
            EscalationEvent::IntentHandled {
                catalog: CatalogName::Welcome,
            },
        );
        assert_eq!(result.new_state, EscalationState::Normal);
        assert_eq!(persisted_count(&result), 0);
    }
}
