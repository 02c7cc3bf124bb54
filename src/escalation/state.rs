//! Escalation state types

use super::MAX_FALLBACK;
use serde::{Deserialize, Serialize};

/// Escalation state of a session, classified from its stored fallback count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscalationState {
    /// No outstanding misses
    #[default]
    Normal,

    /// `count` consecutive misses already answered with a retry prompt,
    /// `1 <= count < MAX_FALLBACK`
    Retrying { count: u32 },

    /// Retry budget spent; the next miss ends the conversation
    Terminated,
}

impl EscalationState {
    /// Classify a stored fallback count
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => EscalationState::Normal,
            count if count < MAX_FALLBACK => EscalationState::Retrying { count },
            _ => EscalationState::Terminated,
        }
    }

    /// Counter value this state persists as
    pub fn fallback_count(self) -> u32 {
        match self {
            EscalationState::Normal => 0,
            EscalationState::Retrying { count } => count,
            EscalationState::Terminated => MAX_FALLBACK,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EscalationState::Terminated)
    }
}
