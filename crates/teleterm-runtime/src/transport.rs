//! Reply-channel boundary consumed by the dispatcher, and the inbound
//! request shape it produces.

use std::future::Future;

use thiserror::Error;

/// One inbound event from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub sender: i64,
    /// Chat to reply into.
    pub chat: i64,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Text(String),
    /// Inline button press.
    Callback { id: String, data: String },
}

impl InboundRequest {
    pub fn is_callback(&self) -> bool {
        matches!(self.kind, RequestKind::Callback { .. })
    }

    /// Message text, or the callback token for button presses.
    pub fn text(&self) -> &str {
        match &self.kind {
            RequestKind::Text(text) => text,
            RequestKind::Callback { data, .. } => data,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(reqwest::Error),

    #[error("api error: {description}")]
    Api { description: String },

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    /// Request urls embed the bot token, so they are dropped from the error.
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

/// Outbound calls against the chat platform. Message ids are returned so
/// the live view can delete them later.
pub trait Transport: Send + Sync {
    fn send_text(
        &self,
        chat: i64,
        text: &str,
    ) -> impl Future<Output = Result<i64, TransportError>> + Send;

    /// Send `html` with HTML parse mode.
    fn send_html(
        &self,
        chat: i64,
        html: &str,
    ) -> impl Future<Output = Result<i64, TransportError>> + Send;

    /// Send `html` with one inline button that presses back `token`.
    fn send_html_with_button(
        &self,
        chat: i64,
        html: &str,
        label: &str,
        token: &str,
    ) -> impl Future<Output = Result<i64, TransportError>> + Send;

    fn delete_message(
        &self,
        chat: i64,
        message_id: i64,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn answer_callback(
        &self,
        callback_id: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
