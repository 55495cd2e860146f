//! Session context and per-session locking.
//!
//! Every inbound event for a session runs inside a [`SessionContext`], which
//! holds that session's lock for its whole lifetime. Reads and writes of
//! `mode` and `active_conversation` within one event therefore cannot
//! interleave with another event for the same session.

use crate::error::StateError;
use crate::state::{self, DialogueMode, StateKey, StateStore};
use chatdeck_core::ConversationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Identifies the session an event belongs to (the chat it came from).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed async mutex, one lock per session.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the lock of `session`.
    ///
    /// Entries of other sessions that nobody holds or waits on are dropped
    /// here, so the table stays as large as the set of busy sessions.
    pub async fn acquire(&self, session: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // The table's own handle is the only one left on an idle entry.
            locks.retain(|id, lock| id == session || Arc::strong_count(lock) > 1);
            locks
                .entry(session.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of sessions currently in the table.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Returns true if the table holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

/// Opens session contexts over a shared state store.
#[derive(Clone)]
pub struct SessionManager {
    state: Arc<dyn StateStore>,
    locks: Arc<SessionLocks>,
}

impl SessionManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self {
            state,
            locks: Arc::new(SessionLocks::new()),
        }
    }

    /// Locks `session` and returns its context. The lock is released when
    /// the context is dropped.
    pub async fn open(&self, session: SessionId) -> SessionContext {
        let guard = self.locks.acquire(&session).await;
        debug!(session = %session, "session opened");
        SessionContext {
            session,
            state: Arc::clone(&self.state),
            _guard: guard,
        }
    }
}

/// Exclusive view of one session's state for the duration of an event.
pub struct SessionContext {
    session: SessionId,
    state: Arc<dyn StateStore>,
    _guard: OwnedMutexGuard<()>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// The session this context belongs to.
    #[must_use]
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Current mode; idle if never set.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub async fn mode(&self) -> Result<DialogueMode, StateError> {
        state::read_mode(self.state.as_ref()).await
    }

    /// Active conversation, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub async fn active_conversation(&self) -> Result<Option<ConversationId>, StateError> {
        state::read_active_conversation(self.state.as_ref()).await
    }

    /// Makes `conversation` active and switches to dialogue mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub async fn enter_dialogue(&self, conversation: ConversationId) -> Result<(), StateError> {
        self.state
            .set(&[
                (StateKey::ActiveConversation, conversation.to_string()),
                (StateKey::Mode, DialogueMode::Dialogue.as_str().to_string()),
            ])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use std::time::Duration;

    #[tokio::test]
    async fn enter_dialogue_sets_both_keys() {
        let manager = SessionManager::new(Arc::new(MemoryStateStore::new()));
        let ctx = manager.open(SessionId::new("42")).await;
        assert_eq!(ctx.mode().await.expect("mode"), DialogueMode::Idle);

        let id = ConversationId::new();
        ctx.enter_dialogue(id).await.expect("enter");

        assert_eq!(ctx.mode().await.expect("mode"), DialogueMode::Dialogue);
        assert_eq!(ctx.active_conversation().await.expect("active"), Some(id));
    }

    #[tokio::test]
    async fn same_session_is_serialised() {
        let manager = SessionManager::new(Arc::new(MemoryStateStore::new()));
        let first = manager.open(SessionId::new("42")).await;

        let second = tokio::time::timeout(
            Duration::from_millis(20),
            manager.open(SessionId::new("42")),
        )
        .await;
        assert!(second.is_err(), "second open must wait for the first");

        drop(first);
        let reopened = tokio::time::timeout(
            Duration::from_millis(200),
            manager.open(SessionId::new("42")),
        )
        .await;
        assert!(reopened.is_ok());
    }

    #[tokio::test]
    async fn different_sessions_do_not_block() {
        let manager = SessionManager::new(Arc::new(MemoryStateStore::new()));
        let _first = manager.open(SessionId::new("1")).await;
        let second = tokio::time::timeout(
            Duration::from_millis(200),
            manager.open(SessionId::new("2")),
        )
        .await;
        assert!(second.is_ok());
        assert_eq!(manager.locks.len().await, 2);
    }

    #[tokio::test]
    async fn idle_sessions_are_pruned() {
        let manager = SessionManager::new(Arc::new(MemoryStateStore::new()));
        for chat in ["1", "2", "3"] {
            drop(manager.open(SessionId::new(chat)).await);
        }
        assert_eq!(manager.locks.len().await, 1);

        let held = manager.open(SessionId::new("4")).await;
        drop(manager.open(SessionId::new("5")).await);
        assert_eq!(manager.locks.len().await, 2);
        drop(held);
    }
}
