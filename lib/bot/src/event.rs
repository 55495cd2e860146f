//! Inbound events and payload parsing.

use crate::transport::{ChatTarget, MessageRef};
use chatdeck_home::{CONTROL_NAMESPACE, REFRESH_TOKEN};

/// Marker some clients prepend to callback payloads.
pub const CALLBACK_ESCAPE: char = '\u{000C}';

/// Who sent an event and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSource {
    /// Chat the event came from.
    pub chat_id: i64,
    /// Sending user.
    pub user_id: i64,
    /// Topic thread, if any.
    pub thread_id: Option<i64>,
}

impl EventSource {
    /// Replies go back to the same chat and thread.
    #[must_use]
    pub fn reply_target(&self) -> ChatTarget {
        ChatTarget {
            chat_id: self.chat_id,
            thread_id: self.thread_id,
        }
    }
}

/// Supported commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start`
    Start,
    /// `/new_dialogue` or `/new`
    NewDialogue,
    /// `/devices`
    Devices,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "new_dialogue" | "new" => Some(Self::NewDialogue),
            "devices" => Some(Self::Devices),
            _ => None,
        }
    }
}

/// An inbound interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A recognised command with its trailing arguments.
    Command {
        source: EventSource,
        command: Command,
        args: String,
    },
    /// Free text (including unrecognised commands).
    Text { source: EventSource, text: String },
    /// A button tap.
    Callback {
        source: EventSource,
        callback_id: String,
        message: Option<MessageRef>,
        data: String,
    },
}

impl InboundEvent {
    /// Classifies a text message as a command or plain text.
    #[must_use]
    pub fn from_text(source: EventSource, text: &str) -> Self {
        match parse_command(text) {
            Some((command, args)) => Self::Command {
                source,
                command,
                args: args.to_string(),
            },
            None => Self::Text {
                source,
                text: text.to_string(),
            },
        }
    }

    /// Where the event came from.
    #[must_use]
    pub fn source(&self) -> &EventSource {
        match self {
            Self::Command { source, .. }
            | Self::Text { source, .. }
            | Self::Callback { source, .. } => source,
        }
    }
}

/// Parses `/name[@bot] [args]`. Returns `None` for non-commands and
/// unknown command names.
#[must_use]
pub fn parse_command(text: &str) -> Option<(Command, &str)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(head, args)| (head, args.trim()));
    let name = head.split_once('@').map_or(head, |(name, _)| name);
    Command::from_name(name).map(|command| (command, args))
}

/// What a device-control callback asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Re-read the registry and redraw the menu.
    Refresh,
    /// Operate the device with this entity id.
    Device(String),
}

/// Parses a callback payload.
///
/// Leading escape markers are stripped. Payloads outside the `control:`
/// namespace, or with nothing after it, yield `None`.
#[must_use]
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    let suffix = data
        .trim_start_matches(CALLBACK_ESCAPE)
        .strip_prefix(CONTROL_NAMESPACE)?;
    match suffix {
        "" => None,
        REFRESH_TOKEN => Some(CallbackAction::Refresh),
        entity_id => Some(CallbackAction::Device(entity_id.to_string())),
    }
}
