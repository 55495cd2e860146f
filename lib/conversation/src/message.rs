//! Message records.
//!
//! Messages are append-only. Each one points at the message it replies to,
//! or at [`MessageId::ROOT`] when it opens the thread.

use chatdeck_ai::ChatMessage;
use chatdeck_core::{ConversationId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// The message this one replies to, or the root sentinel.
    pub parent_id: MessageId,
    /// Whether the operator wrote this message.
    pub is_user: bool,
    /// Owner label for user messages, model name for assistant messages.
    pub sender: String,
    /// Provider key copied from the conversation.
    pub provider_key: String,
    /// Model copied from the conversation.
    pub model: String,
    /// Conversation owner copied from the conversation.
    pub owner: String,
    /// Message text.
    pub text: String,
    /// When the message was stored.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Returns true if this message opens its thread.
    #[must_use]
    pub fn is_thread_root(&self) -> bool {
        self.parent_id.is_root()
    }

    /// Converts the message into a completion-request entry.
    #[must_use]
    pub fn to_chat_message(&self) -> ChatMessage {
        if self.is_user {
            ChatMessage::user(self.text.clone())
        } else {
            ChatMessage::assistant(self.text.clone())
        }
    }
}
