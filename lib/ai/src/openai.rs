//! OpenAI-compatible chat-completion client.
//!
//! Used for every provider in [`ProviderKind`]: OpenAI itself and
//! OpenRouter, which exposes the same `/v1/chat/completions` API.

use crate::backend::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatProvider, ChatRole,
    ProviderKind,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default request timeout for completions.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Which provider this endpoint represents.
    pub kind: ProviderKind,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL without the `/v1` suffix.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl OpenAiCompatibleConfig {
    /// Creates a configuration using the provider's default base URL.
    #[must_use]
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            base_url: kind.default_base_url().to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for an OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    kind: ProviderKind,
    api_key: String,
    completions_url: String,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("kind", &self.kind)
            .field("completions_url", &self.completions_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::ProviderNotConfigured {
                provider: config.kind.to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            kind: config.kind,
            api_key: config.api_key,
            completions_url: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
        })
    }

    fn map_transport_error(&self, e: &reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_connect() {
            LlmError::ProviderUnavailable {
                provider: self.kind.to_string(),
                reason: e.to_string(),
            }
        } else {
            LlmError::RequestFailed {
                reason: e.to_string(),
            }
        }
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionPayload {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Maps a non-success HTTP status to an error.
pub(crate) fn classify_status(
    kind: ProviderKind,
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> LlmError {
    let reason = format!("{status} - {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthenticationFailed {
            provider: kind.to_string(),
            reason,
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited { retry_after_secs },
        s if s.is_server_error() => LlmError::ProviderUnavailable {
            provider: kind.to_string(),
            reason,
        },
        _ => LlmError::RequestFailed { reason },
    }
}

/// Extracts the first choice from a completion response body.
pub(crate) fn parse_completion(body: &str) -> Result<ChatCompletionResponse, LlmError> {
    let payload: CompletionPayload =
        serde_json::from_str(body).map_err(|e| LlmError::ResponseParseFailed {
            reason: e.to_string(),
        })?;

    let choice = payload
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ResponseParseFailed {
            reason: "response contained no choices".to_string(),
        })?;

    let role = match choice.message.role.as_deref() {
        Some("user") => ChatRole::User,
        Some("system") => ChatRole::System,
        _ => ChatRole::Assistant,
    };

    Ok(ChatCompletionResponse {
        message: ChatMessage {
            role,
            content: choice.message.content.unwrap_or_default(),
        },
    })
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleClient {
    #[instrument(skip(self, request), fields(provider = %self.kind, model = %request.model, messages = request.messages.len()))]
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let body = CompletionBody {
            model: &request.model,
            messages: &request.messages,
        };

        let response = self
            .http
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        if !status.is_success() {
            return Err(classify_status(self.kind, status, retry_after_secs, &text));
        }

        let completion = parse_completion(&text)?;
        debug!(chars = completion.content().len(), "completion received");
        Ok(completion)
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}
