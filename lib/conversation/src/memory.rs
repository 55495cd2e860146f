//! In-memory conversation repository.

use crate::conversation::{Conversation, Tag};
use crate::error::StoreError;
use crate::message::Message;
use crate::store::ConversationRepository;
use async_trait::async_trait;
use chatdeck_core::ConversationId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    conversations: HashMap<ConversationId, Conversation>,
    messages: Vec<Message>,
    tags: Vec<Tag>,
}

/// Conversation repository held in process memory.
#[derive(Debug, Default)]
pub struct MemoryConversationRepository {
    inner: Mutex<Inner>,
}

impl MemoryConversationRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn tags(&self) -> Vec<Tag> {
        self.inner.lock().await.tags.clone()
    }
}

#[async_trait]
impl ConversationRepository for MemoryConversationRepository {
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.conversations.contains_key(&conversation.id) {
            return Ok(());
        }
        inner
            .conversations
            .insert(conversation.id, conversation.clone());

        let now = Utc::now();
        for tag in inner
            .tags
            .iter_mut()
            .filter(|t| t.owner == conversation.owner && conversation.tags.contains(&t.name))
        {
            tag.count += 1;
            tag.updated_at = now;
        }
        Ok(())
    }

    async fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self.inner.lock().await.conversations.get(&id).cloned())
    }

    async fn update_title(
        &self,
        id: ConversationId,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.conversations.get_mut(&id) {
            Some(conversation) => {
                conversation.title = title.to_string();
                conversation.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.messages.iter().any(|m| m.id == message.id) {
            inner.messages.push(message.clone());
        }
        Ok(())
    }

    async fn find_tag(&self, owner: &str, name: &str) -> Result<Option<Tag>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .tags
            .iter()
            .find(|t| t.owner == owner && t.name == name)
            .cloned())
    }

    async fn max_tag_position(&self, owner: &str) -> Result<Option<i32>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .tags
            .iter()
            .filter(|t| t.owner == owner)
            .map(|t| t.position)
            .max())
    }

    async fn insert_tag(&self, tag: &Tag) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .tags
            .iter()
            .any(|t| t.owner == tag.owner && t.name == tag.name)
        {
            return Ok(false);
        }
        inner.tags.push(tag.clone());
        Ok(true)
    }
}
