//! Events that drive escalation transitions

use crate::catalog::CatalogName;

/// Outcome of recognizing the user's input for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationEvent {
    /// A non-fallback intent matched; its reply comes from `catalog`
    IntentHandled { catalog: CatalogName },
    /// Input could not be mapped to any intent
    Fallback,
}

impl EscalationEvent {
    /// Whether the transition depends on the stored fallback count
    pub fn reads_count(self) -> bool {
        matches!(self, EscalationEvent::Fallback)
    }
}
