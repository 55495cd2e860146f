//! Core types and utilities for chatdeck.
//!
//! This crate provides the identifiers, error handling alias and retry
//! policy shared by every other chatdeck crate.

pub mod error;
pub mod id;
pub mod retry;

pub use error::Result;
pub use id::{ConversationId, MessageId, ParseIdError};
pub use retry::{RetryPolicy, Transient};
