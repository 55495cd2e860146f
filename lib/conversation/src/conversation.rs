//! Conversation and tag records.

use chatdeck_core::ConversationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Title every conversation starts with until titling replaces it.
pub const PLACEHOLDER_TITLE: &str = "New Chat";

/// A conversation between the operator and one provider/model pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: ConversationId,
    /// Owner label in the document store.
    pub owner: String,
    /// Persisted provider key (e.g. `openai`).
    pub provider_key: String,
    /// Model used for every turn.
    pub model: String,
    /// Conversation title.
    pub title: String,
    /// Tags attached to the conversation.
    pub tags: BTreeSet<String>,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated.
    pub updated_at: DateTime<Utc>,
    /// Whether the conversation is archived.
    pub archived: bool,
}

impl Conversation {
    /// Creates a conversation with the placeholder title.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        provider_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            owner: owner.into(),
            provider_key: provider_key.into(),
            model: model.into(),
            title: PLACEHOLDER_TITLE.to_string(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            archived: false,
        }
    }

    /// Attaches a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// A per-owner tag used to group conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Owner label.
    pub owner: String,
    /// Tag name.
    pub name: String,
    /// Display position among the owner's tags (1-based).
    pub position: i32,
    /// Number of conversations created under this tag.
    pub count: i32,
    /// Free-form description.
    pub description: String,
    /// When the tag was created.
    pub created_at: DateTime<Utc>,
    /// When the tag was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// Creates a tag at the given position with a zero count.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        position: i32,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            owner: owner.into(),
            name: name.into(),
            position,
            count: 0,
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Position for a new tag given the owner's current maximum.
    #[must_use]
    pub fn next_position(current_max: Option<i32>) -> i32 {
        current_max.map_or(1, |max| max + 1)
    }
}
