//! Chat-completion providers for chatdeck.
//!
//! This crate provides:
//!
//! - **Provider abstraction**: a uniform non-streaming completion contract
//! - **Provider registry**: resolves persisted provider keys to backends
//! - **OpenAI-compatible client**: the HTTP backend for every provider
//! - **Prompts**: the dialogue preamble and title-generation prompt

pub mod backend;
pub mod error;
pub mod openai;
pub mod prompt;
pub mod registry;
pub mod retry;

pub use backend::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatProvider, ChatRole,
    ProviderKind,
};
pub use error::LlmError;
pub use openai::{OpenAiCompatibleClient, OpenAiCompatibleConfig};
pub use registry::{ProviderCredentials, ProviderRegistry};
pub use retry::RetryingProvider;
