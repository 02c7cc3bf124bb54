//! HTTP webhook host
//!
//! Receives fulfillment requests from the recognition platform, turns them
//! into [`Turn`](crate::turn::Turn)s, dispatches them and serializes the reply.

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::context::SqliteContextStore;
use crate::dispatch::Dispatcher;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Where the host keeps session contexts between turns
#[derive(Clone)]
pub enum ContextSource {
    /// Contexts arrive in the request and are echoed in the response
    Request,
    /// Contexts persist in SQLite; turns on one session are serialized
    Sqlite {
        store: SqliteContextStore,
        locks: Arc<SessionLocks>,
    },
}

impl ContextSource {
    pub fn sqlite(store: SqliteContextStore) -> Self {
        ContextSource::Sqlite {
            store,
            locks: Arc::new(SessionLocks::default()),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub contexts: ContextSource,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, contexts: ContextSource) -> Self {
        Self {
            dispatcher,
            contexts,
        }
    }
}

/// One async mutex per active session
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    /// Handle on `session`'s lock, created on first use. The entry is
    /// forgotten when the last handle drops, including handles owned by a
    /// request that was cancelled while waiting.
    pub fn acquire(self: &Arc<Self>, session: &str) -> SessionLockHandle {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(session.to_string())
            .or_default()
            .clone();
        SessionLockHandle {
            locks: Arc::clone(self),
            session: session.to_string(),
            lock,
        }
    }

    fn release(&self, session: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // One handle in the map, one being dropped
        let current = locks
            .get(session)
            .is_some_and(|entry| Arc::ptr_eq(entry, lock));
        if current && Arc::strong_count(lock) <= 2 {
            locks.remove(session);
        }
    }

    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

/// A claim on one session's lock; see [`SessionLocks::acquire`]
pub struct SessionLockHandle {
    locks: Arc<SessionLocks>,
    session: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl SessionLockHandle {
    /// Wait for exclusive use of the session
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for SessionLockHandle {
    fn drop(&mut self) {
        self.locks.release(&self.session, &self.lock);
    }
}
