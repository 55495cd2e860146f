//! Error types for the bot crate.

use chatdeck_core::Transient;
use std::fmt;

/// Errors from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never got a response.
    ConnectionFailed { reason: String },
    /// The API rejected the request.
    Rejected { code: u16, description: String },
    /// The API asked us to slow down.
    RateLimited { retry_after_secs: Option<u64> },
    /// The response could not be decoded.
    InvalidResponse { reason: String },
    /// The request timed out.
    Timeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => write!(f, "connection failed: {reason}"),
            Self::Rejected { code, description } => {
                write!(f, "request rejected ({code}): {description}")
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidResponse { reason } => write!(f, "invalid response: {reason}"),
            Self::Timeout => write!(f, "request timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

impl Transient for TransportError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::RateLimited { .. } | Self::Timeout
        )
    }
}
