//! Retrying decorator for chat providers.

use crate::backend::{ChatCompletionRequest, ChatCompletionResponse, ChatProvider, ProviderKind};
use crate::error::LlmError;
use async_trait::async_trait;
use chatdeck_core::RetryPolicy;

/// Wraps a provider with a bounded retry policy for transient failures.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: ChatProvider> RetryingProvider<P> {
    /// Wraps `inner`.
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<P: ChatProvider> ChatProvider for RetryingProvider<P> {
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        self.policy
            .run("chat_completion", || self.inner.create_chat_completion(request))
            .await
    }

    fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }
}
