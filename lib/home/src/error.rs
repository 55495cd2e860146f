//! Error types for the home crate.
//!
//! - `RegistryError`: errors from the device registry
//! - `ControlError`: errors from the home-automation service, carried in a
//!   `rootcause::Report` by the HTTP client

use chatdeck_core::Transient;
use std::fmt;

/// Errors from device registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No device with this entity id.
    NotFound { entity_id: String },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity_id } => write!(f, "device not found: {entity_id}"),
            Self::StorageFailed { reason } => write!(f, "device storage failed: {reason}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl Transient for RegistryError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::StorageFailed { .. })
    }
}

/// Errors from the home-automation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The HTTP client could not be built.
    InvalidConfig { reason: String },
    /// The request never got a response.
    ConnectionFailed { reason: String },
    /// The service answered with a non-success status.
    UnexpectedStatus { status: u16, body: String },
    /// The response body could not be decoded.
    InvalidResponse { reason: String },
    /// The request timed out.
    Timeout,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid client configuration: {reason}"),
            Self::ConnectionFailed { reason } => write!(f, "connection failed: {reason}"),
            Self::UnexpectedStatus { status, body } => {
                write!(f, "unexpected status {status}: {body}")
            }
            Self::InvalidResponse { reason } => write!(f, "invalid response: {reason}"),
            Self::Timeout => write!(f, "request timed out"),
        }
    }
}

impl std::error::Error for ControlError {}

impl Transient for ControlError {
    fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidConfig { .. } | Self::InvalidResponse { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = ControlError::UnexpectedStatus {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = ControlError::UnexpectedStatus {
            status: 404,
            body: "Entity not found.".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn registry_not_found_display() {
        let err = RegistryError::NotFound {
            entity_id: "light.kitchen".to_string(),
        };
        assert_eq!(err.to_string(), "device not found: light.kitchen");
        assert!(!err.is_transient());
    }
}
