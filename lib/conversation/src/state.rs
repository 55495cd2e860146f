//! Session state: dialogue mode and the active conversation reference.

use crate::error::StateError;
use async_trait::async_trait;
use chatdeck_core::ConversationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::Mutex;

/// The fixed set of session state keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    /// Current interaction mode.
    Mode,
    /// Identifier of the conversation text is appended to.
    ActiveConversation,
}

impl StateKey {
    /// Storage key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mode => "mode",
            Self::ActiveConversation => "active_conversation",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interaction mode of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueMode {
    /// Text is ignored.
    #[default]
    Idle,
    /// Text is routed to the active conversation.
    Dialogue,
}

impl DialogueMode {
    /// Stored value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dialogue => "dialogue",
        }
    }
}

impl FromStr for DialogueMode {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "dialogue" => Ok(Self::Dialogue),
            other => Err(StateError::InvalidValue {
                key: StateKey::Mode.as_str().to_string(),
                reason: format!("unknown mode '{other}'"),
            }),
        }
    }
}

/// Durable key-value store for session state.
///
/// Writes are per-key upserts, durable before `set` returns, and not atomic
/// across keys.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads a value. Fails with [`StateError::NotFound`] if never set.
    async fn get(&self, key: StateKey) -> Result<String, StateError>;

    /// Upserts each entry in order.
    async fn set(&self, entries: &[(StateKey, String)]) -> Result<(), StateError>;
}

/// Reads the current mode. A key that was never written means idle.
///
/// # Errors
///
/// Returns an error if the store fails or holds an unknown mode.
pub async fn read_mode(store: &dyn StateStore) -> Result<DialogueMode, StateError> {
    match store.get(StateKey::Mode).await {
        Ok(value) => value.parse(),
        Err(StateError::NotFound { .. }) => Ok(DialogueMode::Idle),
        Err(e) => Err(e),
    }
}

/// Reads the active conversation, if one was ever set.
///
/// # Errors
///
/// Returns an error if the store fails or holds an unparseable id.
pub async fn read_active_conversation(
    store: &dyn StateStore,
) -> Result<Option<ConversationId>, StateError> {
    match store.get(StateKey::ActiveConversation).await {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e: chatdeck_core::ParseIdError| StateError::InvalidValue {
                key: StateKey::ActiveConversation.as_str().to_string(),
                reason: e.to_string(),
            }),
        Err(StateError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<StateKey, String>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: StateKey) -> Result<String, StateError> {
        self.values
            .lock()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| StateError::NotFound {
                key: key.as_str().to_string(),
            })
    }

    async fn set(&self, entries: &[(StateKey, String)]) -> Result<(), StateError> {
        let mut values = self.values.lock().await;
        for (key, value) in entries {
            values.insert(*key, value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_unset_key_is_not_found() {
        let store = MemoryStateStore::new();
        let err = store.get(StateKey::Mode).await.expect_err("unset");
        assert_eq!(
            err,
            StateError::NotFound {
                key: "mode".to_string()
            }
        );
    }

    #[tokio::test]
    async fn set_upserts_each_key() {
        let store = MemoryStateStore::new();
        store
            .set(&[(StateKey::Mode, "idle".to_string())])
            .await
            .expect("set");
        store
            .set(&[(StateKey::Mode, "dialogue".to_string())])
            .await
            .expect("set");
        assert_eq!(store.get(StateKey::Mode).await.expect("get"), "dialogue");
    }

    #[tokio::test]
    async fn unset_mode_reads_as_idle() {
        let store = MemoryStateStore::new();
        assert_eq!(read_mode(&store).await.expect("mode"), DialogueMode::Idle);
        assert_eq!(read_active_conversation(&store).await.expect("active"), None);
    }

    #[tokio::test]
    async fn active_conversation_roundtrip() {
        let store = MemoryStateStore::new();
        let id = ConversationId::new();
        store
            .set(&[(StateKey::ActiveConversation, id.to_string())])
            .await
            .expect("set");
        assert_eq!(
            read_active_conversation(&store).await.expect("active"),
            Some(id)
        );
    }

    #[tokio::test]
    async fn unknown_mode_is_invalid() {
        let store = MemoryStateStore::new();
        store
            .set(&[(StateKey::Mode, "authoring".to_string())])
            .await
            .expect("set");
        assert!(matches!(
            read_mode(&store).await,
            Err(StateError::InvalidValue { .. })
        ));
    }
}
