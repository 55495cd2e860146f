//! Conversation and session engine for chatdeck.
//!
//! This crate provides:
//!
//! - **Data model**: conversations, messages and tags
//! - **State Store**: dialogue mode and active conversation per operator
//! - **Conversation Store**: conversation rules over a pluggable repository
//! - **Sessions**: per-session locking and the session context
//! - **Orchestrator**: the dialogue state machine
//! - **Titling**: bounded background title generation

pub mod conversation;
pub mod error;
pub mod memory;
pub mod message;
pub mod orchestrator;
pub mod retry;
pub mod session;
pub mod state;
pub mod store;
pub mod titling;

pub use conversation::{Conversation, PLACEHOLDER_TITLE, Tag};
pub use error::{DialogueError, StateError, StoreError, TitleError};
pub use memory::MemoryConversationRepository;
pub use message::Message;
pub use orchestrator::{
    NoTyping, OrchestratorSettings, SessionOrchestrator, TurnOutcome, TypingIndicator,
    build_completion_input, start_acknowledgement,
};
pub use retry::{RetryingConversationRepository, RetryingStateStore};
pub use session::{SessionContext, SessionId, SessionLocks, SessionManager};
pub use state::{DialogueMode, MemoryStateStore, StateKey, StateStore};
pub use store::{ConversationRepository, ConversationSettings, ConversationStore};
pub use titling::{TitleJob, TitleSettings, TitleWorker};
