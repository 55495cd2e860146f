//! Chat-facing side of chatdeck.
//!
//! This crate provides:
//!
//! - **Transport contract**: what the bot needs from a chat service
//! - **Events**: inbound commands, text and callbacks, with payload parsing
//! - **Router**: dispatches events to the dialogue engine or device control
//! - **Devices**: the device menu and device callback handling

pub mod devices;
pub mod error;
pub mod event;
pub mod format;
pub mod router;
pub mod transport;

#[cfg(test)]
mod testing;

pub use devices::DeviceController;
pub use error::TransportError;
pub use event::{
    CALLBACK_ESCAPE, CallbackAction, Command, EventSource, InboundEvent, parse_callback,
    parse_command,
};
pub use format::escape_markdown;
pub use router::{EventRouter, HELP_TEXT, RouterSettings};
pub use transport::{ChatTarget, ChatTransport, MessageRef, TextFormat, TransportTyping};
