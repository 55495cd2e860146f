//! Error types for the AI crate.
//!
//! - `LlmError`: failures of a provider call or of provider resolution

use chatdeck_core::Transient;
use std::fmt;

/// Errors from chat-completion providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider key is not one of the supported providers.
    UnknownProvider { key: String },
    /// Provider is known but no credential was configured for it.
    ProviderNotConfigured { provider: String },
    /// Provider is unavailable (connection failure or 5xx).
    ProviderUnavailable { provider: String, reason: String },
    /// The provider rejected the credential.
    AuthenticationFailed { provider: String, reason: String },
    /// Request failed.
    RequestFailed { reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl LlmError {
    /// Returns true for errors caused by configuration rather than the call.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownProvider { .. } | Self::ProviderNotConfigured { .. } | Self::InvalidConfig { .. }
        )
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProvider { key } => write!(f, "unknown LLM provider '{key}'"),
            Self::ProviderNotConfigured { provider } => {
                write!(f, "LLM provider '{provider}' has no credential configured")
            }
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::AuthenticationFailed { provider, reason } => {
                write!(f, "LLM provider '{provider}' rejected credentials: {reason}")
            }
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::Timeout | Self::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::ProviderUnavailable {
            provider: "openai".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("openai"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn rate_limit_display_includes_delay() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(7),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 7s");
    }

    #[test]
    fn only_transport_failures_are_transient() {
        assert!(LlmError::Timeout.is_transient());
        assert!(
            LlmError::RateLimited {
                retry_after_secs: None
            }
            .is_transient()
        );
        assert!(
            !LlmError::AuthenticationFailed {
                provider: "openai".to_string(),
                reason: "bad key".to_string(),
            }
            .is_transient()
        );
        assert!(
            !LlmError::UnknownProvider {
                key: "x".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(
            LlmError::UnknownProvider {
                key: "x".to_string()
            }
            .is_configuration()
        );
        assert!(!LlmError::Timeout.is_configuration());
    }
}
