//! Recording fakes shared by the router and device tests.

use crate::error::TransportError;
use crate::transport::{ChatTarget, ChatTransport, MessageRef, TextFormat};
use async_trait::async_trait;
use chatdeck_core::Result as ControlResult;
use chatdeck_home::{ActionMenu, ControlError, EntityState, HomeControl};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentText {
    pub target: ChatTarget,
    pub text: String,
    pub format: TextFormat,
}

#[derive(Default)]
pub(crate) struct RecordingTransport {
    next_id: AtomicI64,
    texts: Mutex<Vec<SentText>>,
    menus: Mutex<Vec<(ChatTarget, ActionMenu)>>,
    edits: Mutex<Vec<(MessageRef, ActionMenu)>>,
    answers: Mutex<Vec<(String, Option<String>)>>,
    typing: Mutex<Vec<ChatTarget>>,
}

impl RecordingTransport {
    pub fn texts(&self) -> Vec<SentText> {
        self.texts.lock().expect("lock").clone()
    }

    pub fn menus(&self) -> Vec<(ChatTarget, ActionMenu)> {
        self.menus.lock().expect("lock").clone()
    }

    pub fn edits(&self) -> Vec<(MessageRef, ActionMenu)> {
        self.edits.lock().expect("lock").clone()
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().expect("lock").clone()
    }

    pub fn typing_targets(&self) -> Vec<ChatTarget> {
        self.typing.lock().expect("lock").clone()
    }

    fn message(&self, target: ChatTarget) -> MessageRef {
        MessageRef {
            chat_id: target.chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(
        &self,
        target: ChatTarget,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageRef, TransportError> {
        self.texts.lock().expect("lock").push(SentText {
            target,
            text: text.to_string(),
            format,
        });
        Ok(self.message(target))
    }

    async fn send_menu(
        &self,
        target: ChatTarget,
        menu: &ActionMenu,
    ) -> Result<MessageRef, TransportError> {
        self.menus
            .lock()
            .expect("lock")
            .push((target, menu.clone()));
        Ok(self.message(target))
    }

    async fn edit_menu(&self, message: MessageRef, menu: &ActionMenu) -> Result<(), TransportError> {
        self.edits
            .lock()
            .expect("lock")
            .push((message, menu.clone()));
        Ok(())
    }

    async fn notify_typing(&self, target: ChatTarget) -> Result<(), TransportError> {
        self.typing.lock().expect("lock").push(target);
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.answers
            .lock()
            .expect("lock")
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingControl {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingControl {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: String) -> ControlResult<(), ControlError> {
        self.calls.lock().expect("lock").push(call);
        if self.fail {
            return Err(ControlError::UnexpectedStatus {
                status: 500,
                body: "Internal Server Error".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl HomeControl for RecordingControl {
    async fn turn_on(&self, entity_id: &str) -> ControlResult<(), ControlError> {
        self.record(format!("turn_on {entity_id}"))
    }

    async fn turn_off(&self, entity_id: &str) -> ControlResult<(), ControlError> {
        self.record(format!("turn_off {entity_id}"))
    }

    async fn toggle(&self, entity_id: &str) -> ControlResult<(), ControlError> {
        self.record(format!("toggle {entity_id}"))
    }

    async fn press(&self, entity_id: &str) -> ControlResult<(), ControlError> {
        self.record(format!("press {entity_id}"))
    }

    async fn get_state(&self, entity_id: &str) -> ControlResult<EntityState, ControlError> {
        self.record(format!("get_state {entity_id}"))?;
        Ok(EntityState {
            entity_id: entity_id.to_string(),
            state: "on".to_string(),
            attributes: HashMap::new(),
        })
    }
}
