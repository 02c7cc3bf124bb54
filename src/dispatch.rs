//! Intent dispatch
//!
//! Maps recognized intents to handlers through a registration table that is
//! validated at startup, runs the escalation transition for the turn, and
//! executes its effects against the context store and the catalog.

use crate::catalog::{CatalogName, ResponseCatalog};
use crate::channel::{shape, ReplyPayload};
use crate::context::{
    fallback_parameters, read_fallback_count, ContextStore, ContextUnavailable, HELPER_CONTEXT,
};
use crate::escalation::{transition, Effect, EscalationEvent, EscalationState};
use crate::turn::Turn;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const WELCOME_INTENT: &str = "Default Welcome Intent";
pub const FALLBACK_INTENT: &str = "Default Fallback Intent";

/// Handler variants an intent can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentHandler {
    /// Greet the user and clear the miss streak
    Welcome,
    /// Escalate the miss streak
    Fallback,
}

impl IntentHandler {
    pub const ALL: [IntentHandler; 2] = [IntentHandler::Welcome, IntentHandler::Fallback];

    fn event(self) -> EscalationEvent {
        match self {
            IntentHandler::Welcome => EscalationEvent::IntentHandled {
                catalog: CatalogName::Welcome,
            },
            IntentHandler::Fallback => EscalationEvent::Fallback,
        }
    }
}

/// Errors found while building the handler table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("No intent is routed to the {0:?} handler")]
    MissingHandler(IntentHandler),
    #[error("Intent names must not be blank")]
    BlankIntent,
    #[error("Intent registered twice: {0}")]
    Duplicate(String),
}

/// Errors that fail a turn
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No handler registered for intent: {0}")]
    UnknownIntent(String),
    #[error(transparent)]
    ContextUnavailable(#[from] ContextUnavailable),
    #[error("Handler for intent {0} produced no reply")]
    NoReply(String),
}

/// Static intent name -> handler table
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    entries: HashMap<String, IntentHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two intents every agent ships with
    pub fn standard() -> Self {
        let entries = [
            (WELCOME_INTENT.to_string(), IntentHandler::Welcome),
            (FALLBACK_INTENT.to_string(), IntentHandler::Fallback),
        ]
        .into_iter()
        .collect();
        Self { entries }
    }

    /// Route `intent` to `handler`.
    ///
    /// # Errors
    ///
    /// Rejects blank names and names already registered.
    pub fn register(
        mut self,
        intent: impl Into<String>,
        handler: IntentHandler,
    ) -> Result<Self, RegistrationError> {
        let intent = intent.into();
        if intent.trim().is_empty() {
            return Err(RegistrationError::BlankIntent);
        }
        if self.entries.contains_key(&intent) {
            return Err(RegistrationError::Duplicate(intent));
        }
        self.entries.insert(intent, handler);
        Ok(self)
    }

    /// Check that every handler variant is reachable.
    ///
    /// # Errors
    ///
    /// Returns the first handler with no intent routed to it.
    pub fn validate(self) -> Result<Self, RegistrationError> {
        for handler in IntentHandler::ALL {
            if !self.entries.values().any(|h| *h == handler) {
                return Err(RegistrationError::MissingHandler(handler));
            }
        }
        Ok(self)
    }

    pub fn lookup(&self, intent: &str) -> Option<IntentHandler> {
        self.entries.get(intent).copied()
    }

    pub fn intents(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Routes turns to handlers
pub struct Dispatcher {
    catalog: Arc<ResponseCatalog>,
    handlers: HandlerTable,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Fails when the handler table does not validate.
    pub fn new(
        catalog: Arc<ResponseCatalog>,
        handlers: HandlerTable,
    ) -> Result<Self, RegistrationError> {
        Ok(Self {
            catalog,
            handlers: handlers.validate()?,
        })
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Handle one turn.
    ///
    /// Reads the helper context at most once (only fallbacks need the
    /// count), runs the escalation transition and executes its effects: one
    /// context write and one reply.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownIntent`] when no handler is registered,
    /// [`DispatchError::ContextUnavailable`] when the store fails.
    pub async fn dispatch<S, R>(
        &self,
        turn: &Turn,
        store: &S,
        rng: &mut R,
    ) -> Result<ReplyPayload, DispatchError>
    where
        S: ContextStore + ?Sized,
        R: Rng + Send + ?Sized,
    {
        let Some(handler) = self.handlers.lookup(turn.intent()) else {
            tracing::warn!(session = %turn.session(), intent = %turn.intent(), "No handler for intent");
            return Err(DispatchError::UnknownIntent(turn.intent().to_string()));
        };

        let event = handler.event();
        let state = if event.reads_count() {
            EscalationState::from_count(read_fallback_count(store).await?)
        } else {
            EscalationState::default()
        };
        let result = transition(state, event);

        tracing::info!(
            session = %turn.session(),
            intent = %turn.intent(),
            handler = ?handler,
            from = ?state,
            to = ?result.new_state,
            "Escalation transition"
        );

        let mut reply = None;
        for effect in result.effects {
            match effect {
                Effect::PersistCount {
                    fallback_count,
                    lifespan,
                } => {
                    store
                        .set_context(HELPER_CONTEXT, lifespan, fallback_parameters(fallback_count))
                        .await
                        .inspect_err(|e| {
                            tracing::error!(session = %turn.session(), error = %e, "Failed to persist helper context");
                        })?;
                }
                Effect::Reply {
                    catalog,
                    index,
                    expect_more_input,
                } => {
                    let text =
                        self.catalog
                            .resolve_or_diagnostic(catalog, turn.locale(), index, rng);
                    reply = Some(shape(text, turn.channel(), expect_more_input));
                }
            }
        }

        reply.ok_or_else(|| DispatchError::NoReply(turn.intent().to_string()))
    }
}
