//! Helper Fulfillment - conversational agent webhook core
//!
//! Dispatches recognized intents to handlers, escalates repeated
//! misunderstandings to a closing reply, and shapes localized replies for
//! the voice assistant or a plain text channel.

pub mod catalog;
pub mod channel;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod escalation;
pub mod turn;
pub mod webhook;
