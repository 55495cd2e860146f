//! Chat transport contract.

use crate::error::TransportError;
use async_trait::async_trait;
use chatdeck_conversation::TypingIndicator;
use chatdeck_home::ActionMenu;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Where a message is delivered: a chat, optionally a topic thread in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatTarget {
    /// Chat id.
    pub chat_id: i64,
    /// Topic thread within the chat.
    pub thread_id: Option<i64>,
}

impl ChatTarget {
    /// Targets the chat itself.
    #[must_use]
    pub fn chat(chat_id: i64) -> Self {
        Self {
            chat_id,
            thread_id: None,
        }
    }
}

/// A delivered message that can be edited later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Chat the message lives in.
    pub chat_id: i64,
    /// Message id within the chat.
    pub message_id: i64,
}

/// How message text is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextFormat {
    /// Shown verbatim.
    #[default]
    Plain,
    /// Telegram MarkdownV2; reserved characters must already be escaped.
    MarkdownV2,
}

/// Delivers messages and callback answers to the operator.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends a text message.
    async fn send_text(
        &self,
        target: ChatTarget,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageRef, TransportError>;

    /// Sends a message with buttons.
    async fn send_menu(
        &self,
        target: ChatTarget,
        menu: &ActionMenu,
    ) -> Result<MessageRef, TransportError>;

    /// Replaces the text and buttons of a sent menu.
    async fn edit_menu(&self, message: MessageRef, menu: &ActionMenu)
    -> Result<(), TransportError>;

    /// Shows the "typing" status.
    async fn notify_typing(&self, target: ChatTarget) -> Result<(), TransportError>;

    /// Answers a callback, optionally with a short notice.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}

/// Typing indicator that fires a detached `notify_typing` call.
pub struct TransportTyping {
    transport: Arc<dyn ChatTransport>,
    target: ChatTarget,
}

impl TransportTyping {
    /// Creates an indicator for `target`.
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, target: ChatTarget) -> Self {
        Self { transport, target }
    }
}

impl TypingIndicator for TransportTyping {
    fn typing(&self) {
        let transport = Arc::clone(&self.transport);
        let target = self.target;
        tokio::spawn(async move {
            if let Err(e) = transport.notify_typing(target).await {
                debug!(chat_id = target.chat_id, error = %e, "typing notification failed");
            }
        });
    }
}
