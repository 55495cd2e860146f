//! The dialogue state machine.
//!
//! [`SessionOrchestrator`] starts conversations and runs one text turn at a
//! time inside a locked [`SessionContext`]. It never sends anything itself;
//! callers deliver the returned reply or the error's user message.

use crate::conversation::Conversation;
use crate::error::DialogueError;
use crate::message::Message;
use crate::session::SessionContext;
use crate::store::ConversationStore;
use crate::titling::{TitleJob, TitleWorker};
use chatdeck_ai::{ChatCompletionRequest, ChatMessage, ProviderKind, ProviderRegistry, prompt};
use chatdeck_core::{ConversationId, MessageId};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Best-effort "typing" signal shown while a completion is running.
pub trait TypingIndicator: Send + Sync {
    /// Shows the indicator. Must not block; failures are ignored.
    fn typing(&self);
}

/// Indicator that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTyping;

impl TypingIndicator for NoTyping {
    fn typing(&self) {}
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Provider used by `/new_dialogue` without an explicit provider.
    pub default_provider: ProviderKind,
    /// Model used for title generation.
    pub summary_model: String,
    /// Per-provider title models, taking precedence over `summary_model`.
    pub summary_model_overrides: HashMap<ProviderKind, String>,
}

impl OrchestratorSettings {
    /// Creates settings with no per-provider title models.
    #[must_use]
    pub fn new(default_provider: ProviderKind, summary_model: impl Into<String>) -> Self {
        Self {
            default_provider,
            summary_model: summary_model.into(),
            summary_model_overrides: HashMap::new(),
        }
    }

    /// Uses `model` for titles of conversations on `kind`.
    #[must_use]
    pub fn with_summary_model_override(
        mut self,
        kind: ProviderKind,
        model: impl Into<String>,
    ) -> Self {
        self.summary_model_overrides.insert(kind, model.into());
        self
    }

    /// Title model for conversations on `kind`.
    #[must_use]
    pub fn summary_model_for(&self, kind: ProviderKind) -> &str {
        self.summary_model_overrides
            .get(&kind)
            .map_or(self.summary_model.as_str(), String::as_str)
    }
}

/// Result of a completed text turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Conversation the turn was appended to.
    pub conversation_id: ConversationId,
    /// Stored user message.
    pub user_message_id: MessageId,
    /// Stored assistant message.
    pub assistant_message_id: MessageId,
    /// Text to send back to the operator.
    pub reply: String,
    /// Whether a title job was scheduled for this turn.
    pub title_scheduled: bool,
}

/// Builds the completion input for the next turn.
///
/// The result is the system preamble, then `history` in order, then the new
/// user text: `history.len() + 2` entries.
#[must_use]
pub fn build_completion_input(history: &[Message], user_text: &str) -> Vec<ChatMessage> {
    let mut input = Vec::with_capacity(history.len() + 2);
    input.push(ChatMessage::system(prompt::SYSTEM_PREAMBLE));
    input.extend(history.iter().map(Message::to_chat_message));
    input.push(ChatMessage::user(user_text));
    input
}

/// Acknowledgement sent after a dialogue starts.
#[must_use]
pub fn start_acknowledgement(conversation: &Conversation) -> String {
    let provider = conversation
        .provider_key
        .parse::<ProviderKind>()
        .map_or_else(|_| conversation.provider_key.clone(), |k| k.display_name().to_string());
    format!(
        "Starting new conversation with {provider} {}",
        conversation.model
    )
}

/// Runs dialogues for sessions.
#[derive(Clone)]
pub struct SessionOrchestrator {
    store: ConversationStore,
    providers: ProviderRegistry,
    titler: TitleWorker,
    settings: OrchestratorSettings,
}

impl SessionOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        store: ConversationStore,
        providers: ProviderRegistry,
        titler: TitleWorker,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            providers,
            titler,
            settings,
        }
    }

    /// The conversation store.
    #[must_use]
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Creates a conversation and makes it the session's active one.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not configured or storage fails.
    #[instrument(skip(self, ctx), fields(session = %ctx.session()))]
    pub async fn start_dialogue(
        &self,
        ctx: &SessionContext,
        provider: Option<ProviderKind>,
    ) -> Result<Conversation, DialogueError> {
        let kind = provider.unwrap_or(self.settings.default_provider);
        self.providers
            .get(kind)
            .map_err(|reason| DialogueError::ProviderNotRecognized {
                key: kind.as_str().to_string(),
                reason,
            })?;

        let conversation = self.store.create_conversation(kind).await?;
        ctx.enter_dialogue(conversation.id).await?;

        info!(conversation_id = %conversation.id, "dialogue started");
        Ok(conversation)
    }

    /// Runs one text turn against the active conversation.
    ///
    /// The user message is stored before the provider is called and stays
    /// stored if the call fails.
    ///
    /// # Errors
    ///
    /// See [`DialogueError`]; its `user_message` is what the operator sees.
    #[instrument(skip(self, ctx, text, typing), fields(session = %ctx.session()))]
    pub async fn handle_text(
        &self,
        ctx: &SessionContext,
        text: &str,
        typing: &dyn TypingIndicator,
    ) -> Result<TurnOutcome, DialogueError> {
        let conversation_id = ctx
            .active_conversation()
            .await?
            .ok_or(DialogueError::NoActiveConversation)?;

        let conversation = self.store.get_conversation(conversation_id).await?;
        let provider = self
            .providers
            .resolve(&conversation.provider_key)
            .map_err(|reason| DialogueError::ProviderNotRecognized {
                key: conversation.provider_key.clone(),
                reason,
            })?;

        // Linear threads: the newest message is the leaf.
        let history = self.store.list_messages(conversation_id).await?;
        let parent_id = history.last().map_or(MessageId::ROOT, |m| m.id);

        let user_message_id = self
            .store
            .append_message(conversation_id, text, parent_id, true)
            .await?;

        let request =
            ChatCompletionRequest::new(&conversation.model, build_completion_input(&history, text));
        typing.typing();

        let response = match provider.create_chat_completion(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "chat completion failed");
                return Err(DialogueError::Completion(e));
            }
        };
        let reply = response.content().to_string();

        let assistant_message_id = self
            .store
            .append_message(conversation_id, &reply, user_message_id, false)
            .await?;

        let title_scheduled = history.is_empty();
        if title_scheduled {
            let summary_model = self.settings.summary_model_for(provider.kind()).to_string();
            self.titler.schedule(TitleJob {
                conversation_id,
                provider,
                summary_model,
                user_text: text.to_string(),
                response_text: reply.clone(),
            });
        }

        debug!(
            conversation_id = %conversation_id,
            history_len = history.len(),
            title_scheduled,
            "turn complete"
        );
        Ok(TurnOutcome {
            conversation_id,
            user_message_id,
            assistant_message_id,
            reply,
            title_scheduled,
        })
    }
}
