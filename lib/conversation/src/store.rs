//! Conversation and message store.
//!
//! [`ConversationRepository`] is the raw persistence contract; it knows
//! nothing about titles, tags or owners. [`ConversationStore`] layers the
//! conversation rules on top of any repository.

use crate::conversation::{Conversation, Tag};
use crate::error::StoreError;
use crate::message::Message;
use async_trait::async_trait;
use chatdeck_ai::ProviderKind;
use chatdeck_core::{ConversationId, MessageId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Description given to the tag created at startup.
pub const AUTO_TAG_DESCRIPTION: &str = "Auto-created tag for chatdeck";

/// Raw persistence for conversations, messages and tags.
///
/// Writes must be safe to replay: a write whose acknowledgement was lost
/// may be sent again by [`RetryingConversationRepository`].
///
/// [`RetryingConversationRepository`]: crate::RetryingConversationRepository
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Inserts a new conversation and bumps the count of each of its tags,
    /// in one unit. Inserting an id that already exists changes nothing.
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// Looks up a conversation.
    async fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Sets title and update time. Returns false if the conversation is absent.
    async fn update_title(
        &self,
        id: ConversationId,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Lists messages of a conversation in insertion order.
    async fn list_messages(&self, conversation_id: ConversationId)
    -> Result<Vec<Message>, StoreError>;

    /// Appends a message. Inserting an id that already exists changes nothing.
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Looks up a tag by owner and name.
    async fn find_tag(&self, owner: &str, name: &str) -> Result<Option<Tag>, StoreError>;

    /// Highest tag position used by an owner.
    async fn max_tag_position(&self, owner: &str) -> Result<Option<i32>, StoreError>;

    /// Inserts a tag unless one with the same owner and name exists.
    ///
    /// Returns true if the tag was inserted.
    async fn insert_tag(&self, tag: &Tag) -> Result<bool, StoreError>;
}

/// Settings that shape new conversations and messages.
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    /// Owner label stored on conversations.
    pub owner: String,
    /// Sender name for the operator's messages.
    pub owner_label: String,
    /// Tag attached to every new conversation.
    pub tag: String,
    /// Model used when a provider has no override.
    pub default_model: String,
    /// Per-provider model overrides.
    pub model_overrides: HashMap<ProviderKind, String>,
}

impl ConversationSettings {
    /// Creates settings with no model overrides.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        owner_label: impl Into<String>,
        tag: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            owner_label: owner_label.into(),
            tag: tag.into(),
            default_model: default_model.into(),
            model_overrides: HashMap::new(),
        }
    }

    /// Uses `model` for conversations on `kind`.
    #[must_use]
    pub fn with_model_override(mut self, kind: ProviderKind, model: impl Into<String>) -> Self {
        self.model_overrides.insert(kind, model.into());
        self
    }

    /// Model for new conversations on `kind`.
    #[must_use]
    pub fn model_for(&self, kind: ProviderKind) -> &str {
        self.model_overrides
            .get(&kind)
            .map_or(self.default_model.as_str(), String::as_str)
    }
}

/// Conversation store with the creation, append and tagging rules.
#[derive(Clone)]
pub struct ConversationStore {
    repo: Arc<dyn ConversationRepository>,
    settings: ConversationSettings,
}

impl ConversationStore {
    /// Creates a store without touching the repository.
    #[must_use]
    pub fn new(repo: Arc<dyn ConversationRepository>, settings: ConversationSettings) -> Self {
        Self { repo, settings }
    }

    /// Creates a store and ensures the configured tag exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag cannot be ensured.
    pub async fn open(
        repo: Arc<dyn ConversationRepository>,
        settings: ConversationSettings,
    ) -> Result<Self, StoreError> {
        let store = Self::new(repo, settings);
        let owner = store.settings.owner.clone();
        let tag = store.settings.tag.clone();
        store.ensure_tag(&owner, &tag).await?;
        Ok(store)
    }

    /// Store settings.
    #[must_use]
    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    /// Creates the tag if it does not exist yet.
    ///
    /// New tags are placed after the owner's highest position, or at 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn ensure_tag(&self, owner: &str, name: &str) -> Result<Tag, StoreError> {
        if let Some(existing) = self.repo.find_tag(owner, name).await? {
            debug!(owner, tag = name, "tag already exists");
            return Ok(existing);
        }

        let position = Tag::next_position(self.repo.max_tag_position(owner).await?);
        let tag = Tag::new(owner, name, position, AUTO_TAG_DESCRIPTION);
        if self.repo.insert_tag(&tag).await? {
            info!(owner, tag = name, position, "created tag");
            return Ok(tag);
        }

        // Lost a race with a concurrent insert; the stored row wins.
        self.repo
            .find_tag(owner, name)
            .await?
            .ok_or_else(|| StoreError::InvalidData {
                reason: format!("tag '{name}' vanished after insert conflict"),
            })
    }

    /// Creates a conversation on `kind` with the placeholder title.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn create_conversation(&self, kind: ProviderKind) -> Result<Conversation, StoreError> {
        let conversation = Conversation::new(
            self.settings.owner.clone(),
            kind.as_str(),
            self.settings.model_for(kind),
        )
        .with_tag(self.settings.tag.clone());

        self.repo.insert_conversation(&conversation).await?;

        info!(
            conversation_id = %conversation.id,
            provider = kind.as_str(),
            model = %conversation.model,
            "created conversation"
        );
        Ok(conversation)
    }

    /// Fetches a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if it does not exist.
    pub async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, StoreError> {
        self.repo
            .find_conversation(id)
            .await?
            .ok_or(StoreError::ConversationNotFound { id })
    }

    /// Lists a conversation's messages in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        self.repo.list_messages(conversation_id).await
    }

    /// Appends a message, copying provider, model and owner from the
    /// conversation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if the conversation does
    /// not exist.
    pub async fn append_message(
        &self,
        conversation_id: ConversationId,
        text: &str,
        parent_id: MessageId,
        is_user: bool,
    ) -> Result<MessageId, StoreError> {
        let conversation = self.get_conversation(conversation_id).await?;
        let sender = if is_user {
            self.settings.owner_label.clone()
        } else {
            conversation.model.clone()
        };

        let message = Message {
            id: MessageId::new(),
            conversation_id,
            parent_id,
            is_user,
            sender,
            provider_key: conversation.provider_key,
            model: conversation.model,
            owner: conversation.owner,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.repo.insert_message(&message).await?;
        Ok(message.id)
    }

    /// Replaces a conversation's title. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if the conversation does
    /// not exist.
    pub async fn update_title(&self, id: ConversationId, title: &str) -> Result<(), StoreError> {
        if self.repo.update_title(id, title, Utc::now()).await? {
            Ok(())
        } else {
            Err(StoreError::ConversationNotFound { id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::PLACEHOLDER_TITLE;
    use crate::memory::MemoryConversationRepository;

    fn settings() -> ConversationSettings {
        ConversationSettings::new("owner-1", "User", "chatdeck", "gpt-4o")
            .with_model_override(ProviderKind::OpenRouter, "anthropic/claude-3.5-sonnet")
    }

    fn store(repo: &Arc<MemoryConversationRepository>) -> ConversationStore {
        ConversationStore::new(repo.clone(), settings())
    }

    #[tokio::test]
    async fn ensure_tag_is_idempotent() {
        let repo = Arc::new(MemoryConversationRepository::new());
        let store = store(&repo);

        let first = store.ensure_tag("owner-1", "chatdeck").await.expect("ensure");
        let second = store.ensure_tag("owner-1", "chatdeck").await.expect("ensure");

        assert_eq!(first.position, 1);
        assert_eq!(second.position, 1);
        assert_eq!(repo.tags().await.len(), 1);
    }

    #[tokio::test]
    async fn ensure_tag_places_after_existing() {
        let repo = Arc::new(MemoryConversationRepository::new());
        repo.insert_tag(&Tag::new("owner-1", "work", 3, "existing"))
            .await
            .expect("insert");
        let store = store(&repo);

        let tag = store.ensure_tag("owner-1", "chatdeck").await.expect("ensure");
        assert_eq!(tag.position, 4);
        assert_eq!(tag.description, AUTO_TAG_DESCRIPTION);
    }

    #[tokio::test]
    async fn open_ensures_configured_tag() {
        let repo = Arc::new(MemoryConversationRepository::new());
        ConversationStore::open(repo.clone(), settings())
            .await
            .expect("open");
        let tag = repo
            .find_tag("owner-1", "chatdeck")
            .await
            .expect("find")
            .expect("tag exists");
        assert_eq!(tag.position, 1);
    }

    #[tokio::test]
    async fn create_conversation_uses_provider_model_and_tag() {
        let repo = Arc::new(MemoryConversationRepository::new());
        let store = ConversationStore::open(repo.clone(), settings())
            .await
            .expect("open");

        let openai = store
            .create_conversation(ProviderKind::OpenAi)
            .await
            .expect("create");
        let openrouter = store
            .create_conversation(ProviderKind::OpenRouter)
            .await
            .expect("create");

        assert_eq!(openai.provider_key, "openai");
        assert_eq!(openai.model, "gpt-4o");
        assert_eq!(openai.title, PLACEHOLDER_TITLE);
        assert!(openai.tags.contains("chatdeck"));
        assert_eq!(openrouter.model, "anthropic/claude-3.5-sonnet");

        let tag = repo
            .find_tag("owner-1", "chatdeck")
            .await
            .expect("find")
            .expect("tag");
        assert_eq!(tag.count, 2);
    }

    #[tokio::test]
    async fn get_missing_conversation_is_not_found() {
        let repo = Arc::new(MemoryConversationRepository::new());
        let store = store(&repo);
        let id = ConversationId::new();
        assert_eq!(
            store.get_conversation(id).await,
            Err(StoreError::ConversationNotFound { id })
        );
    }

    #[tokio::test]
    async fn append_message_stamps_conversation_fields() {
        let repo = Arc::new(MemoryConversationRepository::new());
        let store = store(&repo);
        let convo = store
            .create_conversation(ProviderKind::OpenAi)
            .await
            .expect("create");

        let user_id = store
            .append_message(convo.id, "Hello", MessageId::ROOT, true)
            .await
            .expect("append");
        store
            .append_message(convo.id, "Hi!", user_id, false)
            .await
            .expect("append");

        let messages = store.list_messages(convo.id).await.expect("list");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, user_id);
        assert_eq!(messages[0].sender, "User");
        assert!(messages[0].is_thread_root());
        assert_eq!(messages[1].parent_id, user_id);
        assert_eq!(messages[1].sender, "gpt-4o");
        for message in &messages {
            assert_eq!(message.provider_key, "openai");
            assert_eq!(message.model, "gpt-4o");
            assert_eq!(message.owner, "owner-1");
        }
    }

    #[tokio::test]
    async fn append_to_missing_conversation_fails() {
        let repo = Arc::new(MemoryConversationRepository::new());
        let store = store(&repo);
        let id = ConversationId::new();
        assert_eq!(
            store.append_message(id, "Hello", MessageId::ROOT, true).await,
            Err(StoreError::ConversationNotFound { id })
        );
    }

    #[tokio::test]
    async fn update_title_last_write_wins() {
        let repo = Arc::new(MemoryConversationRepository::new());
        let store = store(&repo);
        let convo = store
            .create_conversation(ProviderKind::OpenAi)
            .await
            .expect("create");

        store.update_title(convo.id, "First").await.expect("update");
        store.update_title(convo.id, "Second").await.expect("update");

        let stored = store.get_conversation(convo.id).await.expect("get");
        assert_eq!(stored.title, "Second");
        assert!(stored.updated_at >= convo.updated_at);
    }
}
