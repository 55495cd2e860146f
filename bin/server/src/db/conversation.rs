//! Conversation, message and tag repository.

use super::decode_error;
use async_trait::async_trait;
use chatdeck_conversation::{Conversation, ConversationRepository, Message, StoreError, Tag};
use chatdeck_core::{ConversationId, MessageId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

/// Row type for conversation queries.
#[derive(FromRow)]
struct ConversationRow {
    id: String,
    owner: String,
    provider_key: String,
    model: String,
    title: String,
    tags: Vec<String>,
    archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationRow {
    fn try_into_conversation(self) -> Result<Conversation, sqlx::Error> {
        let id: ConversationId = self
            .id
            .parse()
            .map_err(|e| decode_error("conversation id", &self.id, e))?;

        Ok(Conversation {
            id,
            owner: self.owner,
            provider_key: self.provider_key,
            model: self.model,
            title: self.title,
            tags: self.tags.into_iter().collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            archived: self.archived,
        })
    }
}

/// Row type for message queries.
#[derive(FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    parent_id: String,
    is_user: bool,
    sender: String,
    provider_key: String,
    model: String,
    owner: String,
    text: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn try_into_message(self) -> Result<Message, sqlx::Error> {
        let id: MessageId = self
            .id
            .parse()
            .map_err(|e| decode_error("message id", &self.id, e))?;
        let conversation_id: ConversationId = self
            .conversation_id
            .parse()
            .map_err(|e| decode_error("conversation id", &self.conversation_id, e))?;
        let parent_id: MessageId = self
            .parent_id
            .parse()
            .map_err(|e| decode_error("parent id", &self.parent_id, e))?;

        Ok(Message {
            id,
            conversation_id,
            parent_id,
            is_user: self.is_user,
            sender: self.sender,
            provider_key: self.provider_key,
            model: self.model,
            owner: self.owner,
            text: self.text,
            created_at: self.created_at,
        })
    }
}

/// Row type for tag queries.
#[derive(FromRow)]
struct TagRow {
    owner: String,
    name: String,
    position: i32,
    count: i32,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Self {
            owner: row.owner,
            name: row.name,
            position: row.position,
            count: row.count,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed conversation repository.
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a conversation and bumps its tag counts in one transaction.
    ///
    /// An id that already exists is left alone, so a replayed insert does
    /// not count twice.
    pub async fn create(&self, conversation: &Conversation) -> Result<(), sqlx::Error> {
        let tags: Vec<String> = conversation.tags.iter().cloned().collect();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO conversations
                (id, owner, provider_key, model, title, tags, archived, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.owner)
        .bind(&conversation.provider_key)
        .bind(&conversation.model)
        .bind(&conversation.title)
        .bind(&tags)
        .bind(conversation.archived)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            sqlx::query(
                r#"
                UPDATE conversation_tags
                SET count = count + 1, updated_at = now()
                WHERE owner = $1 AND name = ANY($2)
                "#,
            )
            .bind(&conversation.owner)
            .bind(&tags)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Finds a conversation by id.
    pub async fn find(&self, id: ConversationId) -> Result<Option<Conversation>, sqlx::Error> {
        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, owner, provider_key, model, title, tags, archived, created_at, updated_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConversationRow::try_into_conversation).transpose()
    }

    /// Sets the title. Returns false if no row matched.
    pub async fn set_title(
        &self,
        id: ConversationId,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE conversations SET title = $2, updated_at = $3 WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(title)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists messages in insertion order.
    pub async fn messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, conversation_id, parent_id, is_user, sender, provider_key, model,
                   owner, text, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY seq
            "#,
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MessageRow::try_into_message).collect()
    }

    /// Appends a message. A replayed id is ignored.
    pub async fn add_message(&self, message: &Message) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO messages
                (id, conversation_id, parent_id, is_user, sender, provider_key, model,
                 owner, text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.parent_id.to_string())
        .bind(message.is_user)
        .bind(&message.sender)
        .bind(&message.provider_key)
        .bind(&message.model)
        .bind(&message.owner)
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Finds a tag.
    pub async fn tag(&self, owner: &str, name: &str) -> Result<Option<Tag>, sqlx::Error> {
        let row: Option<TagRow> = sqlx::query_as(
            r#"
            SELECT owner, name, position, count, description, created_at, updated_at
            FROM conversation_tags
            WHERE owner = $1 AND name = $2
            "#,
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Tag::from))
    }

    /// Highest tag position for an owner.
    pub async fn max_position(&self, owner: &str) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT MAX(position) FROM conversation_tags WHERE owner = $1
            "#,
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    /// Inserts a tag if absent. Returns true if a row was written.
    pub async fn add_tag(&self, tag: &Tag) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversation_tags
                (owner, name, position, count, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (owner, name) DO NOTHING
            "#,
        )
        .bind(&tag.owner)
        .bind(&tag.name)
        .bind(tag.position)
        .bind(tag.count)
        .bind(&tag.description)
        .bind(tag.created_at)
        .bind(tag.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Decode(reason) => StoreError::InvalidData {
            reason: reason.to_string(),
        },
        other => StoreError::StorageFailed {
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.create(conversation).await.map_err(store_error)
    }

    async fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        self.find(id).await.map_err(store_error)
    }

    async fn update_title(
        &self,
        id: ConversationId,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.set_title(id, title, updated_at)
            .await
            .map_err(store_error)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        self.messages(conversation_id).await.map_err(store_error)
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.add_message(message).await.map_err(store_error)
    }

    async fn find_tag(&self, owner: &str, name: &str) -> Result<Option<Tag>, StoreError> {
        self.tag(owner, name).await.map_err(store_error)
    }

    async fn max_tag_position(&self, owner: &str) -> Result<Option<i32>, StoreError> {
        self.max_position(owner).await.map_err(store_error)
    }

    async fn insert_tag(&self, tag: &Tag) -> Result<bool, StoreError> {
        self.add_tag(tag).await.map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_row(id: String, parent_id: String) -> MessageRow {
        MessageRow {
            id,
            conversation_id: ConversationId::new().to_string(),
            parent_id,
            is_user: true,
            sender: "operator".to_string(),
            provider_key: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            owner: "owner".to_string(),
            text: "hi".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn message_row_decodes_root_parent() {
        let id = MessageId::new();
        let row = message_row(id.to_string(), MessageId::ROOT.to_string());

        let message = row.try_into_message().expect("decode");
        assert_eq!(message.id, id);
        assert!(message.is_thread_root());
    }

    #[test]
    fn message_row_with_bad_id_is_invalid_data() {
        let row = message_row("garbage".to_string(), MessageId::ROOT.to_string());

        let err = row.try_into_message().map_err(store_error).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData { .. }));
    }

    #[test]
    fn conversation_row_collects_tags() {
        let id = ConversationId::new();
        let row = ConversationRow {
            id: id.to_string(),
            owner: "owner".to_string(),
            provider_key: "openrouter".to_string(),
            model: "m".to_string(),
            title: "New Chat".to_string(),
            tags: vec!["chatdeck".to_string(), "chatdeck".to_string()],
            archived: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let conversation = row.try_into_conversation().expect("decode");
        assert_eq!(conversation.id, id);
        assert_eq!(conversation.tags.len(), 1);
        assert_eq!(conversation.title, chatdeck_conversation::PLACEHOLDER_TITLE);
    }
}
