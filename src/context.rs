//! Session context store
//!
//! A context is a named, expiring bag of parameters scoped to one
//! conversation session. The fulfillment core reads and writes a single
//! context (`helpercontext`) through the [`ContextStore`] trait; the host
//! decides where contexts live.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use sqlite::{SessionContexts, SqliteContextStore};

/// Context carrying the escalation counter
pub const HELPER_CONTEXT: &str = "helpercontext";

/// Parameter holding the consecutive-fallback count
pub const FALLBACK_COUNT_KEY: &str = "fallbackCount";

pub type ContextParameters = BTreeMap<String, Value>;

/// The context store could not be read or written
#[derive(Debug, Clone, Error)]
#[error("Context store unavailable: {0}")]
pub struct ContextUnavailable(pub String);

/// A named, expiring set of session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub name: String,
    /// Turns remaining before the context expires
    pub lifespan: u32,
    #[serde(default)]
    pub parameters: ContextParameters,
}

impl SessionContext {
    pub fn new(name: impl Into<String>, lifespan: u32, parameters: ContextParameters) -> Self {
        Self {
            name: name.into(),
            lifespan,
            parameters,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.lifespan == 0
    }
}

/// Access to the contexts of the session a turn belongs to
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Read one parameter; absent or expired contexts yield `None`
    async fn get_parameter(
        &self,
        context_name: &str,
        key: &str,
    ) -> Result<Option<Value>, ContextUnavailable>;

    /// Replace the named context wholesale (parameters are not merged)
    async fn set_context(
        &self,
        context_name: &str,
        lifespan: u32,
        parameters: ContextParameters,
    ) -> Result<(), ContextUnavailable>;
}

#[async_trait]
impl<T: ContextStore + ?Sized> ContextStore for Arc<T> {
    async fn get_parameter(
        &self,
        context_name: &str,
        key: &str,
    ) -> Result<Option<Value>, ContextUnavailable> {
        (**self).get_parameter(context_name, key).await
    }

    async fn set_context(
        &self,
        context_name: &str,
        lifespan: u32,
        parameters: ContextParameters,
    ) -> Result<(), ContextUnavailable> {
        (**self).set_context(context_name, lifespan, parameters).await
    }
}

/// Read `fallbackCount` from the helper context, defaulting to 0.
///
/// Integral floats are accepted since some platforms echo every number as a
/// double. Anything else that is not a non-negative integer counts as 0.
///
/// # Errors
///
/// Propagates [`ContextUnavailable`] from the store.
pub async fn read_fallback_count<S: ContextStore + ?Sized>(
    store: &S,
) -> Result<u32, ContextUnavailable> {
    let value = store
        .get_parameter(HELPER_CONTEXT, FALLBACK_COUNT_KEY)
        .await?;
    Ok(value.as_ref().map_or(0, fallback_count_from_value))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // non-negative integral, filtered before the cast
fn fallback_count_from_value(value: &Value) -> u32 {
    let parsed = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    });

    match parsed.and_then(|n| u32::try_from(n).ok()) {
        Some(count) => count,
        None => {
            tracing::warn!(value = %value, "Ignoring malformed fallbackCount");
            0
        }
    }
}

/// Parameters for the helper context with only the counter set
pub fn fallback_parameters(count: u32) -> ContextParameters {
    let mut parameters = ContextParameters::new();
    parameters.insert(FALLBACK_COUNT_KEY.to_string(), Value::from(count));
    parameters
}

/// Contexts carried in a single webhook request.
///
/// Seeded from the contexts the platform sent; writes are recorded so the
/// host can return them as output contexts.
#[derive(Debug, Default)]
pub struct TurnContexts {
    inner: Mutex<TurnContextsInner>,
}

#[derive(Debug, Default)]
struct TurnContextsInner {
    contexts: HashMap<String, SessionContext>,
    written: BTreeSet<String>,
}

impl TurnContexts {
    pub fn new(incoming: impl IntoIterator<Item = SessionContext>) -> Self {
        let contexts = incoming
            .into_iter()
            .map(|context| (context.name.clone(), context))
            .collect();
        Self {
            inner: Mutex::new(TurnContextsInner {
                contexts,
                written: BTreeSet::new(),
            }),
        }
    }

    /// Contexts set during this turn, in name order
    pub fn written(&self) -> Vec<SessionContext> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner
            .written
            .iter()
            .filter_map(|name| inner.contexts.get(name).cloned())
            .collect()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TurnContextsInner>, ContextUnavailable> {
        self.inner
            .lock()
            .map_err(|_| ContextUnavailable("turn contexts lock poisoned".to_string()))
    }
}

#[async_trait]
impl ContextStore for TurnContexts {
    async fn get_parameter(
        &self,
        context_name: &str,
        key: &str,
    ) -> Result<Option<Value>, ContextUnavailable> {
        let inner = self.lock()?;
        Ok(inner
            .contexts
            .get(context_name)
            .filter(|context| !context.is_expired())
            .and_then(|context| context.parameters.get(key).cloned()))
    }

    async fn set_context(
        &self,
        context_name: &str,
        lifespan: u32,
        parameters: ContextParameters,
    ) -> Result<(), ContextUnavailable> {
        let mut inner = self.lock()?;
        inner.contexts.insert(
            context_name.to_string(),
            SessionContext::new(context_name, lifespan, parameters),
        );
        inner.written.insert(context_name.to_string());
        Ok(())
    }
}
