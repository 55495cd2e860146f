//! Telegram Bot API client.
//!
//! Implements [`ChatTransport`] over `sendMessage`, `editMessageText`,
//! `sendChatAction` and `answerCallbackQuery`, and exposes `getUpdates`
//! for the poller. Inbound updates are turned into [`InboundEvent`]s by
//! [`to_inbound`].

use async_trait::async_trait;
use chatdeck_bot::{
    ChatTarget, ChatTransport, EventSource, InboundEvent, MessageRef, TextFormat, TransportError,
};
use chatdeck_home::ActionMenu;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Timeout for every call except `getUpdates`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time `getUpdates` gets beyond its long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Longest text `sendMessage` accepts, in characters.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// An incoming update.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update id.
    pub update_id: i64,
    /// A new message.
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    /// A button tap.
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// A chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    /// Message id within the chat.
    pub message_id: i64,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Sender; absent for channel posts.
    #[serde(default)]
    pub from: Option<User>,
    /// Topic thread.
    #[serde(default)]
    pub message_thread_id: Option<i64>,
    /// Text, if this is a text message.
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// A callback from an inline keyboard button.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    /// Id to answer with.
    pub id: String,
    /// Who tapped.
    pub from: User,
    /// Message carrying the keyboard.
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    /// Button payload.
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

impl From<&ActionMenu> for InlineKeyboardMarkup {
    fn from(menu: &ActionMenu) -> Self {
        Self {
            inline_keyboard: menu
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineKeyboardButton {
                            text: button.label.clone(),
                            callback_data: button.payload.clone(),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    reply_markup: InlineKeyboardMarkup,
}

#[derive(Serialize)]
struct SendChatAction {
    chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
    action: &'static str,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

/// Splits `text` into pieces of at most `limit` characters, breaking after
/// the last newline of a piece when there is one. The newline a piece ends
/// on is dropped.
fn split_text(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while let Some((cut, _)) = rest.char_indices().nth(limit) {
        match rest[..cut].rfind('\n').filter(|&i| i > 0) {
            Some(newline) => {
                chunks.push(&rest[..newline]);
                rest = &rest[newline + 1..];
            }
            None => {
                chunks.push(&rest[..cut]);
                rest = &rest[cut..];
            }
        }
    }
    chunks.push(rest);
    chunks
}

fn parse_mode(format: TextFormat) -> Option<&'static str> {
    match format {
        TextFormat::Plain => None,
        TextFormat::MarkdownV2 => Some("MarkdownV2"),
    }
}

/// Client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramApi {
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for TelegramApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramApi").finish_non_exhaustive()
    }
}

impl TelegramApi {
    /// Creates a client for `api_base_url` authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or the HTTP client cannot be built.
    pub fn new(api_base_url: &str, token: &str) -> Result<Self, TransportError> {
        if token.trim().is_empty() {
            return Err(TransportError::InvalidResponse {
                reason: "bot token is empty".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{token}", api_base_url.trim_end_matches('/')),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| transport_error(&e))?;
        parse_response(status, &body)
    }

    /// Long-polls for updates after `offset`.
    #[instrument(skip(self))]
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        let params = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message", "callback_query"],
        };
        self.call("getUpdates", &params, timeout + POLL_GRACE).await
    }

    async fn send_message(&self, params: &SendMessage<'_>) -> Result<MessageRef, TransportError> {
        let sent: TelegramMessage = self.call("sendMessage", params, REQUEST_TIMEOUT).await?;
        Ok(MessageRef {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }
}

fn transport_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_decode() {
        TransportError::InvalidResponse {
            reason: e.to_string(),
        }
    } else {
        TransportError::ConnectionFailed {
            reason: e.to_string(),
        }
    }
}

/// Decodes a Bot API response body.
pub(crate) fn parse_response<R: DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<R, TransportError> {
    let envelope: ApiResponse<R> =
        serde_json::from_str(body).map_err(|e| TransportError::InvalidResponse {
            reason: format!("{status}: {e}"),
        })?;

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| TransportError::InvalidResponse {
                reason: "response has no result".to_string(),
            });
    }

    let code = envelope.error_code.unwrap_or(status);
    if code == 429 {
        return Err(TransportError::RateLimited {
            retry_after_secs: envelope.parameters.and_then(|p| p.retry_after),
        });
    }
    Err(TransportError::Rejected {
        code,
        description: envelope.description.unwrap_or_default(),
    })
}

#[async_trait]
impl ChatTransport for TelegramApi {
    async fn send_text(
        &self,
        target: ChatTarget,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageRef, TransportError> {
        let chunks = split_text(text, MAX_MESSAGE_CHARS);
        if chunks.len() > 1 {
            debug!(chat_id = target.chat_id, chunks = chunks.len(), "splitting long message");
        }

        let mut last = None;
        for chunk in chunks {
            last = Some(
                self.send_message(&SendMessage {
                    chat_id: target.chat_id,
                    text: chunk,
                    message_thread_id: target.thread_id,
                    parse_mode: parse_mode(format),
                    reply_markup: None,
                })
                .await?,
            );
        }
        last.ok_or_else(|| TransportError::InvalidResponse {
            reason: "no message was sent".to_string(),
        })
    }

    async fn send_menu(
        &self,
        target: ChatTarget,
        menu: &ActionMenu,
    ) -> Result<MessageRef, TransportError> {
        self.send_message(&SendMessage {
            chat_id: target.chat_id,
            text: &menu.text,
            message_thread_id: target.thread_id,
            parse_mode: None,
            reply_markup: Some(menu.into()),
        })
        .await
    }

    async fn edit_menu(
        &self,
        message: MessageRef,
        menu: &ActionMenu,
    ) -> Result<(), TransportError> {
        let params = EditMessageText {
            chat_id: message.chat_id,
            message_id: message.message_id,
            text: &menu.text,
            reply_markup: menu.into(),
        };
        // Returns the edited message, or `true` for inline messages.
        let _: serde_json::Value = self.call("editMessageText", &params, REQUEST_TIMEOUT).await?;
        debug!(chat_id = message.chat_id, message_id = message.message_id, "menu edited");
        Ok(())
    }

    async fn notify_typing(&self, target: ChatTarget) -> Result<(), TransportError> {
        let params = SendChatAction {
            chat_id: target.chat_id,
            message_thread_id: target.thread_id,
            action: "typing",
        };
        let _: bool = self.call("sendChatAction", &params, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let params = AnswerCallbackQuery {
            callback_query_id: callback_id,
            text,
        };
        let _: bool = self
            .call("answerCallbackQuery", &params, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }
}

/// Converts an update into an event. Updates the bot does not handle
/// (non-text messages, anonymous senders, other update kinds) yield `None`.
#[must_use]
pub fn to_inbound(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let (chat_id, thread_id, message) = match &query.message {
            Some(message) => (
                message.chat.id,
                message.message_thread_id,
                Some(MessageRef {
                    chat_id: message.chat.id,
                    message_id: message.message_id,
                }),
            ),
            None => (query.from.id, None, None),
        };
        return Some(InboundEvent::Callback {
            source: EventSource {
                chat_id,
                user_id: query.from.id,
                thread_id,
            },
            callback_id: query.id,
            message,
            data: query.data.unwrap_or_default(),
        });
    }

    let message = update.message?;
    let user = message.from?;
    let text = message.text?;
    let source = EventSource {
        chat_id: message.chat.id,
        user_id: user.id,
        thread_id: message.message_thread_id,
    };
    Some(InboundEvent::from_text(source, &text))
}

/// Who may talk to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowlist {
    /// The operator.
    pub superuser_id: i64,
    /// Group chat the operator may also use.
    pub supergroup_id: Option<i64>,
}

impl Allowlist {
    /// Only the operator is admitted. With a supergroup configured, only
    /// the operator's private chat and that group are.
    #[must_use]
    pub fn permits(&self, source: &EventSource) -> bool {
        if source.user_id != self.superuser_id {
            return false;
        }
        match self.supergroup_id {
            Some(group) => source.chat_id == group || source.chat_id == self.superuser_id,
            None => true,
        }
    }
}
