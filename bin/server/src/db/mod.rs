//! Database repositories for chatdeck.
//!
//! This module provides data access for:
//! - Session state
//! - Conversations, messages and tags
//! - Devices

pub mod conversation;
pub mod device;
pub mod state;

pub use conversation::PgConversationRepository;
pub use device::PgDeviceRegistry;
pub use state::StateRepository;

/// Wraps a decode failure of a stored value.
pub(crate) fn decode_error(what: &str, value: &str, reason: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {what} '{value}': {reason}"),
    )))
}
