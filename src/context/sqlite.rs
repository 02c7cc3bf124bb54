//! SQLite-backed session contexts
//!
//! For hosts whose channel does not carry contexts back and forth in the
//! request. Rows are keyed by `(session_id, name)`; lifespans count down once
//! per finished turn, skipping contexts written during that turn. Sessions
//! that stop sending turns are swept by [`SqliteContextStore::prune_older_than`].

use super::{ContextParameters, ContextStore, ContextUnavailable, SessionContext};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS session_contexts (
    session_id TEXT NOT NULL,
    name TEXT NOT NULL,
    lifespan INTEGER NOT NULL,
    parameters TEXT NOT NULL DEFAULT '{}',
    updated_at TEXT NOT NULL,

    PRIMARY KEY (session_id, name)
);

CREATE INDEX IF NOT EXISTS idx_session_contexts_updated ON session_contexts(updated_at);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid context parameters: {0}")]
    Parameters(#[from] serde_json::Error),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ContextUnavailable {
    fn from(err: StoreError) -> Self {
        ContextUnavailable(err.to_string())
    }
}

/// Thread-safe handle to the session context database
#[derive(Clone)]
pub struct SqliteContextStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteContextStore {
    /// Open or create the database at the given path
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be applied.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    ///
    /// # Errors
    ///
    /// Fails if the schema cannot be applied.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Scope the store to one session for a single turn
    pub fn session(&self, session_id: impl Into<String>) -> SessionContexts {
        SessionContexts {
            store: self.clone(),
            session_id: session_id.into(),
            written: Mutex::new(BTreeSet::new()),
        }
    }

    /// Get a live (lifespan > 0) context
    ///
    /// # Errors
    ///
    /// Fails on database errors or unparseable stored parameters.
    pub fn get_context(&self, session_id: &str, name: &str) -> StoreResult<Option<SessionContext>> {
        let conn = self.conn()?;
        let row: Option<(u32, String)> = conn
            .query_row(
                "SELECT lifespan, parameters FROM session_contexts
                 WHERE session_id = ?1 AND name = ?2 AND lifespan > 0",
                params![session_id, name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(lifespan, parameters)| {
            let parameters: ContextParameters = serde_json::from_str(&parameters)?;
            Ok(SessionContext::new(name, lifespan, parameters))
        })
        .transpose()
    }

    /// Insert or wholesale replace a context
    ///
    /// # Errors
    ///
    /// Fails on database errors.
    pub fn put_context(&self, session_id: &str, context: &SessionContext) -> StoreResult<()> {
        let conn = self.conn()?;
        let parameters = serde_json::to_string(&context.parameters)?;
        conn.execute(
            "INSERT OR REPLACE INTO session_contexts (session_id, name, lifespan, parameters, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                context.name,
                context.lifespan,
                parameters,
                timestamp(Utc::now())
            ],
        )?;
        Ok(())
    }

    /// Count down lifespans after a turn, except for `written` contexts, and
    /// drop contexts that reached zero. Returns the number dropped.
    ///
    /// # Errors
    ///
    /// Fails on database errors.
    pub fn advance_session(&self, session_id: &str, written: &[String]) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let written = serde_json::to_string(written)?;

        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE session_contexts SET lifespan = lifespan - 1
             WHERE session_id = ?1 AND lifespan > 0
               AND name NOT IN (SELECT value FROM json_each(?2))",
            params![session_id, written],
        )?;
        let expired = tx.execute(
            "DELETE FROM session_contexts WHERE session_id = ?1 AND lifespan <= 0",
            params![session_id],
        )?;
        tx.commit()?;

        Ok(expired)
    }

    /// Delete every context of sessions whose newest write is older than
    /// `max_age`. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Fails on database errors.
    pub fn prune_older_than(&self, max_age: Duration) -> StoreResult<usize> {
        let cutoff = timestamp(Utc::now() - max_age);
        let conn = self.conn()?;
        let pruned = conn.execute(
            "DELETE FROM session_contexts WHERE session_id IN (
                 SELECT session_id FROM session_contexts
                 GROUP BY session_id
                 HAVING MAX(updated_at) < ?1
             )",
            params![cutoff],
        )?;
        Ok(pruned)
    }

    /// Run [`prune_older_than`](Self::prune_older_than) every `every`,
    /// starting one period from now
    pub fn spawn_pruning(&self, max_age: Duration, every: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                match store.prune_older_than(max_age) {
                    Ok(0) => {}
                    Ok(pruned) => tracing::info!(pruned, "Pruned idle session contexts"),
                    Err(e) => tracing::error!(error = %e, "Failed to prune idle session contexts"),
                }
            }
        })
    }
}

/// Fixed-width UTC timestamps so `updated_at` orders lexically
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A [`SqliteContextStore`] scoped to one session and one turn
pub struct SessionContexts {
    store: SqliteContextStore,
    session_id: String,
    written: Mutex<BTreeSet<String>>,
}

impl SessionContexts {
    /// Close the turn: age every context not written during it.
    ///
    /// # Errors
    ///
    /// Fails on database errors.
    pub fn finish_turn(self) -> StoreResult<usize> {
        let written: Vec<String> = self
            .written
            .into_inner()
            .map_err(|_| StoreError::LockPoisoned)?
            .into_iter()
            .collect();
        let expired = self.store.advance_session(&self.session_id, &written)?;
        if expired > 0 {
            tracing::debug!(session = %self.session_id, expired, "Session contexts expired");
        }
        Ok(expired)
    }
}

#[async_trait]
impl ContextStore for SessionContexts {
    async fn get_parameter(
        &self,
        context_name: &str,
        key: &str,
    ) -> Result<Option<Value>, ContextUnavailable> {
        let context = self.store.get_context(&self.session_id, context_name)?;
        Ok(context.and_then(|mut context| context.parameters.remove(key)))
    }

    async fn set_context(
        &self,
        context_name: &str,
        lifespan: u32,
        parameters: ContextParameters,
    ) -> Result<(), ContextUnavailable> {
        let context = SessionContext::new(context_name, lifespan, parameters);
        self.store.put_context(&self.session_id, &context)?;
        self.written
            .lock()
            .map_err(|_| ContextUnavailable(StoreError::LockPoisoned.to_string()))?
            .insert(context_name.to_string());
        Ok(())
    }
}
