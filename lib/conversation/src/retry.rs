//! Retrying decorators for the state store and conversation repository.

use crate::conversation::{Conversation, Tag};
use crate::error::{StateError, StoreError};
use crate::message::Message;
use crate::state::{StateKey, StateStore};
use crate::store::ConversationRepository;
use async_trait::async_trait;
use chatdeck_core::{ConversationId, RetryPolicy};
use chrono::{DateTime, Utc};

/// Wraps a state store with a bounded retry policy.
pub struct RetryingStateStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: StateStore> RetryingStateStore<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<S: StateStore> StateStore for RetryingStateStore<S> {
    async fn get(&self, key: StateKey) -> Result<String, StateError> {
        self.policy.run("state_get", || self.inner.get(key)).await
    }

    async fn set(&self, entries: &[(StateKey, String)]) -> Result<(), StateError> {
        self.policy.run("state_set", || self.inner.set(entries)).await
    }
}

/// Wraps a conversation repository with a bounded retry policy.
///
/// Writes are replayed too; the repository contract makes them idempotent
/// by id.
pub struct RetryingConversationRepository<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: ConversationRepository> RetryingConversationRepository<R> {
    /// Wraps `inner`.
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<R: ConversationRepository> ConversationRepository for RetryingConversationRepository<R> {
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.policy
            .run("insert_conversation", || {
                self.inner.insert_conversation(conversation)
            })
            .await
    }

    async fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        self.policy
            .run("find_conversation", || self.inner.find_conversation(id))
            .await
    }

    async fn update_title(
        &self,
        id: ConversationId,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.policy
            .run("update_title", || self.inner.update_title(id, title, updated_at))
            .await
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        self.policy
            .run("list_messages", || self.inner.list_messages(conversation_id))
            .await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.policy
            .run("insert_message", || self.inner.insert_message(message))
            .await
    }

    async fn find_tag(&self, owner: &str, name: &str) -> Result<Option<Tag>, StoreError> {
        self.policy
            .run("find_tag", || self.inner.find_tag(owner, name))
            .await
    }

    async fn max_tag_position(&self, owner: &str) -> Result<Option<i32>, StoreError> {
        self.policy
            .run("max_tag_position", || self.inner.max_tag_position(owner))
            .await
    }

    async fn insert_tag(&self, tag: &Tag) -> Result<bool, StoreError> {
        self.policy
            .run("insert_tag", || self.inner.insert_tag(tag))
            .await
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConversationRepository;
    use crate::store::{ConversationSettings, ConversationStore};
    use chatdeck_ai::ProviderKind;
    use chatdeck_core::MessageId;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    struct FlakyState {
        failures_left: AtomicU32,
        calls: AtomicU32,
        transient: bool,
    }

    impl FlakyState {
        fn new(failures: u32, transient: bool) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                transient,
            }
        }

        fn fail(&self) -> Option<StateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left == 0 {
                return None;
            }
            self.failures_left.store(left - 1, Ordering::SeqCst);
            Some(if self.transient {
                StateError::StorageFailed {
                    reason: "connection reset".to_string(),
                }
            } else {
                StateError::InvalidValue {
                    key: "mode".to_string(),
                    reason: "garbage".to_string(),
                }
            })
        }
    }

    #[async_trait]
    impl StateStore for FlakyState {
        async fn get(&self, _key: StateKey) -> Result<String, StateError> {
            match self.fail() {
                Some(e) => Err(e),
                None => Ok("dialogue".to_string()),
            }
        }

        async fn set(&self, _entries: &[(StateKey, String)]) -> Result<(), StateError> {
            match self.fail() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(2)
            .with_base_delay_ms(1)
            .with_max_delay_ms(1)
    }

    #[tokio::test]
    async fn retries_transient_state_failures() {
        let store = RetryingStateStore::new(FlakyState::new(2, true), policy());
        assert_eq!(store.get(StateKey::Mode).await.expect("get"), "dialogue");
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let store = RetryingStateStore::new(FlakyState::new(5, true), policy());
        assert!(store.set(&[]).await.is_err());
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_invalid_values() {
        let store = RetryingStateStore::new(FlakyState::new(1, false), policy());
        assert!(store.get(StateKey::Mode).await.is_err());
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repository_decorator_passes_through() {
        let repo = RetryingConversationRepository::new(
            MemoryConversationRepository::new(),
            policy(),
        );
        let convo = Conversation::new("owner", "openai", "gpt-4o");
        repo.insert_conversation(&convo).await.expect("insert");
        assert_eq!(
            repo.find_conversation(convo.id).await.expect("find"),
            Some(convo)
        );
    }

    /// Commits every write, but reports the first write of each kind as
    /// failed, as if the acknowledgement was lost.
    #[derive(Default)]
    struct LostAck {
        inner: MemoryConversationRepository,
        lost: Mutex<Vec<&'static str>>,
    }

    impl LostAck {
        fn lose_first(&self, operation: &'static str) -> Result<(), StoreError> {
            let mut lost = self.lost.lock().expect("lock");
            if lost.contains(&operation) {
                return Ok(());
            }
            lost.push(operation);
            Err(StoreError::StorageFailed {
                reason: "connection reset after commit".to_string(),
            })
        }
    }

    #[async_trait]
    impl ConversationRepository for LostAck {
        async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
            self.inner.insert_conversation(conversation).await?;
            self.lose_first("insert_conversation")
        }

        async fn find_conversation(
            &self,
            id: ConversationId,
        ) -> Result<Option<Conversation>, StoreError> {
            self.inner.find_conversation(id).await
        }

        async fn update_title(
            &self,
            id: ConversationId,
            title: &str,
            updated_at: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            self.inner.update_title(id, title, updated_at).await
        }

        async fn list_messages(
            &self,
            conversation_id: ConversationId,
        ) -> Result<Vec<Message>, StoreError> {
            self.inner.list_messages(conversation_id).await
        }

        async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
            self.inner.insert_message(message).await?;
            self.lose_first("insert_message")
        }

        async fn find_tag(&self, owner: &str, name: &str) -> Result<Option<Tag>, StoreError> {
            self.inner.find_tag(owner, name).await
        }

        async fn max_tag_position(&self, owner: &str) -> Result<Option<i32>, StoreError> {
            self.inner.max_tag_position(owner).await
        }

        async fn insert_tag(&self, tag: &Tag) -> Result<bool, StoreError> {
            self.inner.insert_tag(tag).await
        }
    }

    async fn lossy_store() -> (Arc<RetryingConversationRepository<LostAck>>, ConversationStore) {
        let repo = Arc::new(RetryingConversationRepository::new(
            LostAck::default(),
            policy(),
        ));
        let store = ConversationStore::open(
            repo.clone(),
            ConversationSettings::new("owner-1", "User", "chatdeck", "gpt-4o"),
        )
        .await
        .expect("open");
        (repo, store)
    }

    #[tokio::test]
    async fn replayed_message_insert_is_stored_once() {
        let (_repo, store) = lossy_store().await;
        let convo = store
            .create_conversation(ProviderKind::OpenAi)
            .await
            .expect("create");

        let id = store
            .append_message(convo.id, "hello", MessageId::ROOT, true)
            .await
            .expect("append");

        let messages = store.list_messages(convo.id).await.expect("list");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, id);
    }

    #[tokio::test]
    async fn replayed_conversation_insert_counts_tag_once() {
        let (repo, store) = lossy_store().await;
        store
            .create_conversation(ProviderKind::OpenAi)
            .await
            .expect("create");

        let tag = repo
            .find_tag("owner-1", "chatdeck")
            .await
            .expect("find")
            .expect("tag");
        assert_eq!(tag.count, 1);
    }
}
