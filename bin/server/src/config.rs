//! Centralized service configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested sections (`TELEGRAM__BOT_TOKEN` sets
//! `telegram.bot_token`).

use chatdeck_ai::{LlmError, ProviderCredentials, ProviderKind};
use chatdeck_conversation::{ConversationSettings, OrchestratorSettings, TitleSettings};
use chatdeck_core::RetryPolicy;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Deserialize)]
pub struct BotConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address of the HTTP surface.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory served as static files.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Telegram Bot API settings.
    pub telegram: TelegramConfig,

    /// Conversation defaults.
    pub conversation: ConversationConfig,

    /// Provider credentials.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Home Assistant connection.
    pub home_assistant: HomeAssistantConfig,

    /// Retry policy for external calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Background titling limits.
    #[serde(default)]
    pub title: TitleConfig,
}

/// Telegram Bot API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from BotFather.
    pub bot_token: String,

    /// The only user allowed to talk to the bot.
    pub superuser_id: i64,

    /// Group chat the bot also answers in.
    #[serde(default)]
    pub supergroup_id: Option<i64>,

    /// Topic thread whose text always goes to the dialogue.
    #[serde(default)]
    pub discussion_thread_id: Option<i64>,

    /// Long-poll timeout for `getUpdates`.
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,

    /// Bot API base URL.
    #[serde(default = "default_telegram_api_base_url")]
    pub api_base_url: String,
}

/// Conversation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Owner stored on conversations and tags.
    pub owner: String,

    /// Sender name of the operator's messages.
    #[serde(default = "default_owner_label")]
    pub owner_label: String,

    /// Tag ensured at startup and attached to new conversations.
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Provider used by `/new_dialogue` without an argument.
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model for new conversations.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model for title generation.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// Per-provider models for new conversations, keyed by provider key
    /// (`CONVERSATION__MODELS__OPENROUTER`).
    #[serde(default)]
    pub models: HashMap<String, String>,

    /// Per-provider title models, keyed by provider key
    /// (`CONVERSATION__SUMMARY_MODELS__OPENROUTER`).
    #[serde(default)]
    pub summary_models: HashMap<String, String>,
}

/// Provider API keys. A provider without a key is not registered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    /// OpenAI API key.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// OpenRouter API key.
    #[serde(default)]
    pub openrouter_api_key: Option<String>,
}

/// Home Assistant configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HomeAssistantConfig {
    /// Base URL, e.g. `http://homeassistant.local:8123`.
    pub base_url: String,

    /// Long-lived access token.
    pub token: String,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Titling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TitleConfig {
    /// Time budget per title job.
    #[serde(default = "default_title_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Concurrent title jobs.
    #[serde(default = "default_title_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_static_dir() -> String {
    "pb_public".to_string()
}

fn default_poll_timeout_seconds() -> u64 {
    10
}

fn default_telegram_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_owner_label() -> String {
    "User".to_string()
}

fn default_tag() -> String {
    "chatdeck".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_summary_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_attempts() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    4_000
}

fn default_title_timeout_seconds() -> u64 {
    30
}

fn default_title_max_concurrent() -> usize {
    4
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_title_timeout_seconds(),
            max_concurrent: default_title_max_concurrent(),
        }
    }
}

impl BotConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::default()
            .separator("__")
            .try_parsing(true)
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    /// Parses the configured default provider.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` for keys outside the supported set.
    pub fn default_provider(&self) -> Result<ProviderKind, LlmError> {
        self.conversation.default_provider.parse()
    }

    /// Provider credentials.
    #[must_use]
    pub fn provider_credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            openai_api_key: self.providers.openai_api_key.clone(),
            openrouter_api_key: self.providers.openrouter_api_key.clone(),
        }
    }

    /// Retry policy for external calls.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.retry.max_attempts)
            .with_base_delay_ms(self.retry.base_delay_ms)
            .with_max_delay_ms(self.retry.max_delay_ms)
    }

    /// Title worker limits.
    #[must_use]
    pub fn title_settings(&self) -> TitleSettings {
        TitleSettings {
            timeout: Duration::from_secs(self.title.timeout_seconds),
            max_concurrent: self.title.max_concurrent,
        }
    }

    /// Conversation store settings with the per-provider models applied.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` if a model is keyed by an unsupported provider.
    pub fn conversation_settings(&self) -> Result<ConversationSettings, LlmError> {
        let settings = ConversationSettings::new(
            self.conversation.owner.clone(),
            self.conversation.owner_label.clone(),
            self.conversation.tag.clone(),
            self.conversation.model.clone(),
        );
        per_provider(&self.conversation.models)?
            .into_iter()
            .try_fold(settings, |settings, (kind, model)| {
                Ok(settings.with_model_override(kind, model))
            })
    }

    /// Orchestrator settings with the per-provider title models applied.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` if the default provider or a title model key
    /// is unsupported.
    pub fn orchestrator_settings(&self) -> Result<OrchestratorSettings, LlmError> {
        let settings = OrchestratorSettings::new(
            self.default_provider()?,
            self.conversation.summary_model.clone(),
        );
        per_provider(&self.conversation.summary_models)?
            .into_iter()
            .try_fold(settings, |settings, (kind, model)| {
                Ok(settings.with_summary_model_override(kind, model))
            })
    }
}

fn per_provider(models: &HashMap<String, String>) -> Result<Vec<(ProviderKind, String)>, LlmError> {
    models
        .iter()
        .map(|(key, model)| Ok((key.parse::<ProviderKind>()?, model.clone())))
        .collect()
}
