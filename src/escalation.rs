//! Fallback escalation state machine
//!
//! Tracks consecutive misses per session and decides between a retry prompt
//! and ending the conversation. Transitions are pure; the dispatcher executes
//! the returned effects against the context store and catalog.

mod effect;
pub mod event;
pub mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::EscalationEvent;
pub use state::EscalationState;
pub use transition::{transition, TransitionResult};

/// Misses answered with a retry prompt before the conversation is ended
pub const MAX_FALLBACK: u32 = 3;

/// Turns the helper context survives after each write
pub const CONTEXT_LIFESPAN: u32 = 4;
