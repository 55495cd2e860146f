//! Provider factory.
//!
//! Resolves a persisted provider key to a configured backend. Providers are
//! registered at startup from the configured credentials, so an unknown or
//! unconfigured key surfaces as an [`LlmError`] instead of a panic.

use crate::backend::{ChatProvider, ProviderKind};
use crate::error::LlmError;
use crate::openai::{OpenAiCompatibleClient, OpenAiCompatibleConfig};
use crate::retry::RetryingProvider;
use chatdeck_core::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Credentials per provider. A provider without a key is not registered.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    /// OpenAI API key.
    pub openai_api_key: Option<String>,
    /// OpenRouter API key.
    pub openrouter_api_key: Option<String>,
}

impl ProviderCredentials {
    /// Returns the credential for a provider, if one is set.
    #[must_use]
    pub fn for_kind(&self, kind: ProviderKind) -> Option<&str> {
        let key = match kind {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::OpenRouter => self.openrouter_api_key.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

/// Registry of configured chat providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry with an HTTP client for every provider that has a credential.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be constructed.
    pub fn from_credentials(
        credentials: &ProviderCredentials,
        policy: &RetryPolicy,
    ) -> Result<Self, LlmError> {
        let mut registry = Self::new();
        for kind in ProviderKind::ALL {
            let Some(api_key) = credentials.for_kind(kind) else {
                continue;
            };
            let client = OpenAiCompatibleClient::new(OpenAiCompatibleConfig::new(kind, api_key))?;
            registry.register(Arc::new(RetryingProvider::new(client, policy.clone())));
            info!(provider = %kind, "registered chat provider");
        }
        Ok(registry)
    }

    /// Registers a provider under its own kind, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Returns the provider for a kind.
    ///
    /// # Errors
    ///
    /// Returns `ProviderNotConfigured` if no credential was configured.
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn ChatProvider>, LlmError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| LlmError::ProviderNotConfigured {
                provider: kind.to_string(),
            })
    }

    /// Resolves a persisted provider key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` for keys outside the supported set and
    /// `ProviderNotConfigured` for known providers without a credential.
    pub fn resolve(&self, key: &str) -> Result<Arc<dyn ChatProvider>, LlmError> {
        let kind: ProviderKind = key.parse()?;
        self.get(kind)
    }

    /// Returns true if a provider is registered.
    #[must_use]
    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }
}
