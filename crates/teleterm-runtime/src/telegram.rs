//! Telegram Bot API client: `getUpdates` long-poll plus the send/delete/answer
//! calls behind [`Transport`].

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::transport::{InboundRequest, RequestKind, Transport, TransportError};

const API_BASE: &str = "https://api.telegram.org";

/// Server-side long-poll wait for `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        if !self.ok {
            return Err(TransportError::Api {
                description: self
                    .description
                    .unwrap_or_else(|| "request rejected".to_string()),
            });
        }
        self.result
            .ok_or_else(|| TransportError::Decode("ok response without result".to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl Update {
    /// Text messages and button presses become requests; anything else
    /// (edits, stickers, channel posts) is skipped.
    pub fn into_request(self) -> Option<InboundRequest> {
        if let Some(query) = self.callback_query {
            let chat = query.message.as_ref().map_or(query.from.id, |m| m.chat.id);
            return Some(InboundRequest {
                sender: query.from.id,
                chat,
                kind: RequestKind::Callback {
                    id: query.id,
                    data: query.data.unwrap_or_default(),
                },
            });
        }
        let message = self.message?;
        let sender = message.from?.id;
        Some(InboundRequest {
            sender,
            chat: message.chat.id,
            kind: RequestKind::Text(message.text?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, TransportError> {
        Self::with_base_url(API_BASE, token)
    }

    pub fn with_base_url(api_base: &str, token: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()?;
        Ok(Self {
            http,
            base: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        })
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, body: Value) -> Result<R, TransportError> {
        let response: ApiResponse<R> = self
            .http
            .post(format!("{}/{method}", self.base))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    /// Long-poll for updates with `update_id >= offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    async fn send_message(&self, body: Value) -> Result<i64, TransportError> {
        let sent: SentMessage = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }
}

impl Transport for TelegramClient {
    async fn send_text(&self, chat: i64, text: &str) -> Result<i64, TransportError> {
        self.send_message(json!({ "chat_id": chat, "text": text }))
            .await
    }

    async fn send_html(&self, chat: i64, html: &str) -> Result<i64, TransportError> {
        self.send_message(json!({ "chat_id": chat, "text": html, "parse_mode": "HTML" }))
            .await
    }

    async fn send_html_with_button(
        &self,
        chat: i64,
        html: &str,
        label: &str,
        token: &str,
    ) -> Result<i64, TransportError> {
        self.send_message(json!({
            "chat_id": chat,
            "text": html,
            "parse_mode": "HTML",
            "reply_markup": {
                "inline_keyboard": [[{ "text": label, "callback_data": token }]],
            },
        }))
        .await
    }

    async fn delete_message(&self, chat: i64, message_id: i64) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": chat, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback_id }),
            )
            .await?;
        Ok(())
    }
}
