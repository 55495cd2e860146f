//! Error types for the conversation crate.
//!
//! - `StateError`: errors from the session state store
//! - `StoreError`: errors from the conversation and message store
//! - `DialogueError`: failures of a dialogue operation, with user-facing text
//! - `TitleError`: failures of background title generation (never surfaced)

use chatdeck_ai::LlmError;
use chatdeck_core::{ConversationId, Transient};
use std::fmt;

/// Errors from session state operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Key has never been set.
    NotFound { key: String },
    /// Stored value could not be interpreted.
    InvalidValue { key: String, reason: String },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "state key not found: {key}"),
            Self::InvalidValue { key, reason } => {
                write!(f, "invalid value for state key '{key}': {reason}")
            }
            Self::StorageFailed { reason } => write!(f, "state storage failed: {reason}"),
        }
    }
}

impl std::error::Error for StateError {}

impl Transient for StateError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::StorageFailed { .. })
    }
}

/// Errors from conversation store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Conversation not found.
    ConversationNotFound { id: ConversationId },
    /// Stored record could not be decoded.
    InvalidData { reason: String },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConversationNotFound { id } => write!(f, "conversation not found: {id}"),
            Self::InvalidData { reason } => write!(f, "invalid stored record: {reason}"),
            Self::StorageFailed { reason } => {
                write!(f, "conversation storage failed: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::StorageFailed { .. })
    }
}

/// Failures of a dialogue operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueError {
    /// No conversation is active for the session.
    NoActiveConversation,
    /// The active conversation does not exist.
    ConversationNotFound { id: ConversationId },
    /// The conversation's provider key has no configured backend.
    ProviderNotRecognized { key: String, reason: LlmError },
    /// The completion call failed.
    Completion(LlmError),
    /// Session state could not be read or written.
    State(StateError),
    /// Conversation storage failed.
    Store(StoreError),
}

impl fmt::Display for DialogueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActiveConversation => write!(f, "no active conversation"),
            Self::ConversationNotFound { id } => {
                write!(f, "active conversation {id} not found")
            }
            Self::ProviderNotRecognized { key, reason } => {
                write!(f, "provider '{key}' not recognized: {reason}")
            }
            Self::Completion(e) => write!(f, "chat completion failed: {e}"),
            Self::State(e) => write!(f, "session state error: {e}"),
            Self::Store(e) => write!(f, "conversation store error: {e}"),
        }
    }
}

impl std::error::Error for DialogueError {}

impl DialogueError {
    /// Text shown to the operator.
    ///
    /// Storage details are never included; provider failures carry the
    /// upstream error text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoActiveConversation => {
                "No active conversation, start one with /new_dialogue".to_string()
            }
            Self::ConversationNotFound { .. } => "Unable to get conversation from DB".to_string(),
            Self::ProviderNotRecognized { .. } => "Unable to match provider".to_string(),
            Self::Completion(e) => format!("chat completion error: {e}"),
            Self::State(_) => "Unable to read session state".to_string(),
            Self::Store(_) => "Unable to access conversation storage".to_string(),
        }
    }

    /// Returns true for persistence failures, which are logged at error level.
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::State(_) | Self::Store(_))
    }
}

impl From<StateError> for DialogueError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<StoreError> for DialogueError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConversationNotFound { id } => Self::ConversationNotFound { id },
            other => Self::Store(other),
        }
    }
}

/// Failures of background title generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleError {
    /// Title completion failed.
    Completion(LlmError),
    /// The model returned nothing usable.
    EmptyTitle,
    /// The job exceeded its time budget.
    TimedOut { secs: u64 },
    /// Persisting the title failed.
    Store(StoreError),
    /// The worker stopped accepting jobs.
    WorkerClosed,
}

impl fmt::Display for TitleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completion(e) => write!(f, "title completion failed: {e}"),
            Self::EmptyTitle => write!(f, "generated title was empty"),
            Self::TimedOut { secs } => write!(f, "title generation timed out after {secs}s"),
            Self::Store(e) => write!(f, "failed to store title: {e}"),
            Self::WorkerClosed => write!(f, "title worker closed"),
        }
    }
}

impl std::error::Error for TitleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_error_display() {
        let err = StateError::NotFound {
            key: "mode".to_string(),
        };
        assert!(err.to_string().contains("mode"));
    }

    #[test]
    fn store_not_found_maps_to_dialogue_not_found() {
        let id = ConversationId::new();
        let err: DialogueError = StoreError::ConversationNotFound { id }.into();
        assert_eq!(err, DialogueError::ConversationNotFound { id });
        assert!(!err.is_persistence());
    }

    #[test]
    fn user_message_hides_storage_details() {
        let err = DialogueError::Store(StoreError::StorageFailed {
            reason: "connection reset by peer".to_string(),
        });
        assert!(!err.user_message().contains("connection reset"));
        assert!(err.is_persistence());
    }

    #[test]
    fn user_message_includes_provider_error_text() {
        let err = DialogueError::Completion(LlmError::RequestFailed {
            reason: "quota exceeded".to_string(),
        });
        assert!(err.user_message().contains("quota exceeded"));
    }

    #[test]
    fn unrecognized_provider_message() {
        let err = DialogueError::ProviderNotRecognized {
            key: "mystery".to_string(),
            reason: LlmError::UnknownProvider {
                key: "mystery".to_string(),
            },
        };
        assert_eq!(err.user_message(), "Unable to match provider");
    }
}
