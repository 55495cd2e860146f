//! Inbound event routing.
//!
//! Commands and text run inside the sender's session context. Callbacks in
//! the `control:` namespace go to the [`DeviceController`]; all others are
//! answered without a notice.

use crate::devices::{DeviceController, LIST_FAILED, NO_DEVICES_IN_DATABASE};
use crate::error::TransportError;
use crate::event::{Command, EventSource, InboundEvent, parse_callback};
use crate::format::escape_markdown;
use crate::transport::{ChatTransport, MessageRef, TextFormat, TransportTyping};
use chatdeck_ai::ProviderKind;
use chatdeck_conversation::{
    DialogueError, DialogueMode, SessionContext, SessionId, SessionManager, SessionOrchestrator,
    start_acknowledgement,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reply to `/start`.
pub const HELP_TEXT: &str = "chatdeck is ready.\n\n\
/new_dialogue [provider] starts a new conversation (alias /new)\n\
/devices shows the device menu";

/// Routing options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterSettings {
    /// Text in this thread goes to the dialogue regardless of mode.
    pub discussion_thread_id: Option<i64>,
}

/// Dispatches inbound events.
#[derive(Clone)]
pub struct EventRouter {
    sessions: SessionManager,
    orchestrator: SessionOrchestrator,
    devices: DeviceController,
    transport: Arc<dyn ChatTransport>,
    settings: RouterSettings,
}

impl EventRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(
        sessions: SessionManager,
        orchestrator: SessionOrchestrator,
        devices: DeviceController,
        transport: Arc<dyn ChatTransport>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            sessions,
            orchestrator,
            devices,
            transport,
            settings,
        }
    }

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Returns an error only if a reply could not be delivered. Failures of
    /// the event itself are reported to the operator.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<(), TransportError> {
        match event {
            InboundEvent::Command {
                source,
                command,
                args,
            } => self.handle_command(source, command, &args).await,
            InboundEvent::Text { source, text } => self.handle_text(source, &text).await,
            InboundEvent::Callback {
                callback_id,
                message,
                data,
                ..
            } => self.handle_callback(&callback_id, message, &data).await,
        }
    }

    async fn open_session(&self, source: &EventSource) -> SessionContext {
        self.sessions
            .open(SessionId::new(source.user_id.to_string()))
            .await
    }

    async fn reply(
        &self,
        source: &EventSource,
        text: &str,
        format: TextFormat,
    ) -> Result<(), TransportError> {
        self.transport
            .send_text(source.reply_target(), text, format)
            .await
            .map(|_| ())
    }

    async fn report(&self, source: &EventSource, e: &DialogueError) -> Result<(), TransportError> {
        if e.is_persistence() {
            error!(error = %e, "dialogue failed");
        } else {
            warn!(error = %e, "dialogue failed");
        }
        self.reply(source, &e.user_message(), TextFormat::Plain).await
    }

    async fn handle_command(
        &self,
        source: EventSource,
        command: Command,
        args: &str,
    ) -> Result<(), TransportError> {
        debug!(?command, args, "command received");
        match command {
            Command::Start => self.reply(&source, HELP_TEXT, TextFormat::Plain).await,
            Command::NewDialogue => self.start_dialogue(source, args).await,
            Command::Devices => self.send_device_menu(source).await,
        }
    }

    async fn start_dialogue(&self, source: EventSource, args: &str) -> Result<(), TransportError> {
        let provider = match args.split_whitespace().next() {
            None => None,
            Some(key) => match key.parse::<ProviderKind>() {
                Ok(kind) => Some(kind),
                Err(reason) => {
                    let e = DialogueError::ProviderNotRecognized {
                        key: key.to_string(),
                        reason,
                    };
                    return self.report(&source, &e).await;
                }
            },
        };

        let ctx = self.open_session(&source).await;
        match self.orchestrator.start_dialogue(&ctx, provider).await {
            Ok(conversation) => {
                let ack = escape_markdown(&start_acknowledgement(&conversation));
                self.reply(&source, &ack, TextFormat::MarkdownV2).await
            }
            Err(e) => self.report(&source, &e).await,
        }
    }

    async fn send_device_menu(&self, source: EventSource) -> Result<(), TransportError> {
        match self.devices.device_menu().await {
            Ok(Some(menu)) => self
                .transport
                .send_menu(source.reply_target(), &menu)
                .await
                .map(|_| ()),
            Ok(None) => {
                self.reply(&source, NO_DEVICES_IN_DATABASE, TextFormat::Plain)
                    .await
            }
            Err(e) => {
                error!(error = %e, "failed to list devices");
                self.reply(&source, LIST_FAILED, TextFormat::Plain).await
            }
        }
    }

    fn in_discussion_thread(&self, source: &EventSource) -> bool {
        self.settings
            .discussion_thread_id
            .is_some_and(|thread| source.thread_id == Some(thread))
    }

    async fn handle_text(&self, source: EventSource, text: &str) -> Result<(), TransportError> {
        let ctx = self.open_session(&source).await;

        let mode = match ctx.mode().await {
            Ok(mode) => mode,
            Err(e) => return self.report(&source, &DialogueError::from(e)).await,
        };
        if mode != DialogueMode::Dialogue && !self.in_discussion_thread(&source) {
            debug!(?mode, "ignoring text outside dialogue");
            return Ok(());
        }

        let typing = TransportTyping::new(Arc::clone(&self.transport), source.reply_target());
        match self.orchestrator.handle_text(&ctx, text, &typing).await {
            Ok(outcome) => {
                info!(
                    conversation_id = %outcome.conversation_id,
                    title_scheduled = outcome.title_scheduled,
                    "dialogue turn answered"
                );
                self.reply(&source, &outcome.reply, TextFormat::Plain).await
            }
            Err(e) => self.report(&source, &e).await,
        }
    }

    async fn handle_callback(
        &self,
        callback_id: &str,
        message: Option<MessageRef>,
        data: &str,
    ) -> Result<(), TransportError> {
        let Some(action) = parse_callback(data) else {
            debug!(data, "callback outside control namespace");
            return self.transport.answer_callback(callback_id, None).await;
        };

        let ack = self
            .devices
            .handle(action, message, self.transport.as_ref())
            .await;
        self.transport.answer_callback(callback_id, Some(&ack)).await
    }
}
