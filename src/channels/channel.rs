//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// Stream of inbound messages produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message received from a user on some channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Name of the channel the message arrived on.
    pub channel: String,
    /// Stable identity of the sender on that channel.
    pub user_id: String,
    /// Display name, if the transport provides one.
    pub user_name: Option<String>,
    pub content: String,
    /// Transport-specific data needed to reply (e.g. Telegram `chat_id`).
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            content: content.to_string(),
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    /// Name to show the operator: display name if known, else the id.
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.user_id)
    }
}

/// Rows of button labels shown under a reply.
pub type Keyboard = Vec<Vec<String>>;

/// A reply (or unsolicited message) sent back through a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingResponse {
    pub content: String,
    /// Reply keyboard to attach. `None` leaves the current keyboard alone.
    pub keyboard: Option<Keyboard>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// A chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, used for routing replies and operator notifications.
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Reply to a received message.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Send a message to a recipient that did not necessarily write first.
    async fn send_to(
        &self,
        recipient: &str,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Check that the transport is reachable.
    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_user_id() {
        let msg = IncomingMessage::new("telegram", "12345", "hi");
        assert_eq!(msg.display_name(), "12345");

        let msg = msg.with_user_name("Alice");
        assert_eq!(msg.display_name(), "Alice");
    }

    #[test]
    fn outgoing_text_has_no_keyboard() {
        let resp = OutgoingResponse::text("hello");
        assert_eq!(resp.content, "hello");
        assert!(resp.keyboard.is_none());

        let resp = resp.with_keyboard(vec![vec!["Help".into()]]);
        assert_eq!(resp.keyboard, Some(vec![vec!["Help".to_string()]]));
    }
}
