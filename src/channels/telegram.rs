//! Telegram channel: long-polls the Bot API for updates.
//!
//! Native Rust Telegram Bot API implementation over `reqwest`. Replies go
//! out as plain text (contact names are user input and must not be
//! interpreted as Markdown) with an optional reply keyboard for the menu.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{Channel, IncomingMessage, Keyboard, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Pause before polling again after a failed getUpdates.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different Bot API server (local Bot API, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        build_api_url(&self.api_base, &self.bot_token, method)
    }

    /// Send a text message, splitting it when it exceeds Telegram's limit.
    /// The keyboard is attached to the last chunk only.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard } else { None };
            self.send_message_chunk(chat_id, chunk, markup).await?;
        }
        Ok(())
    }

    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let body = send_message_body(chat_id, text, keyboard);

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage returned {status}: {err}"),
            });
        }

        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let results = match poll_results(&data) {
                    Ok(results) => results,
                    Err(reason) => {
                        tracing::warn!("Telegram getUpdates failed: {reason}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        self.send_message(chat_id, &response.content, response.keyboard.as_ref())
            .await
    }

    async fn send_to(
        &self,
        recipient: &str,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        // A user's private chat id equals their user id.
        self.send_message(recipient, &response.content, response.keyboard.as_ref())
            .await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn build_api_url(api_base: &str, token: &SecretString, method: &str) -> String {
    format!("{api_base}/bot{}/{method}", token.expose_secret())
}

/// Extract the update list from a `getUpdates` reply, or the API's reason
/// for refusing (revoked token, competing poller).
fn poll_results(data: &serde_json::Value) -> Result<&Vec<serde_json::Value>, String> {
    if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
        return Ok(results);
    }
    let code = data
        .get("error_code")
        .and_then(serde_json::Value::as_i64)
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let description = data
        .get("description")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("no result in response");
    Err(format!("error {code}: {description}"))
}

/// Convert one `getUpdates` entry into an [`IncomingMessage`].
///
/// Returns `None` for updates without a text message or sender id.
fn parse_update(update: &serde_json::Value) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(serde_json::Value::as_i64)?.to_string();

    let username = from.get("username").and_then(serde_json::Value::as_str);
    let first_name = from.get("first_name").and_then(serde_json::Value::as_str);

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| user_id.clone());

    let mut incoming = IncomingMessage::new("telegram", &user_id, text).with_metadata(
        serde_json::json!({
            "chat_id": chat_id,
            "username": username,
        }),
    );
    if let Some(name) = first_name.or(username) {
        incoming = incoming.with_user_name(name);
    }
    Some(incoming)
}

/// Build the JSON body for sendMessage.
fn send_message_body(
    chat_id: &str,
    text: &str,
    keyboard: Option<&Keyboard>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });

    if let Some(rows) = keyboard {
        let buttons: Vec<Vec<serde_json::Value>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|label| serde_json::json!({ "text": label }))
                    .collect()
            })
            .collect();
        body["reply_markup"] = serde_json::json!({
            "keyboard": buttons,
            "resize_keyboard": true,
        });
    }

    body
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts at a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut boundary = max_len;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }

        let chunk = &remaining[..boundary];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(boundary);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { boundary } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(token: &str) -> TelegramChannel {
        TelegramChannel::new(SecretString::from(token.to_string()))
    }

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel("fake-token").name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel("123:ABC").api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn telegram_api_url_custom_base() {
        let ch = channel("123:ABC").with_api_base("http://127.0.0.1:8081/");
        assert_eq!(
            ch.api_url("sendMessage"),
            "http://127.0.0.1:8081/bot123:ABC/sendMessage"
        );
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parse_update_text_message() {
        let update = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "from": { "id": 555, "first_name": "Alice", "username": "alice" },
                "chat": { "id": 555, "type": "private" },
                "text": "Add Contact"
            }
        });

        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.user_id, "555");
        assert_eq!(msg.content, "Add Contact");
        assert_eq!(msg.user_name.as_deref(), Some("Alice"));
        assert_eq!(msg.metadata["chat_id"], "555");
        assert_eq!(msg.metadata["username"], "alice");
    }

    #[test]
    fn parse_update_without_first_name_uses_username() {
        let update = serde_json::json!({
            "message": {
                "from": { "id": 7, "username": "bob" },
                "chat": { "id": -100 },
                "text": "hi"
            }
        });
        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.user_name.as_deref(), Some("bob"));
        assert_eq!(msg.metadata["chat_id"], "-100");
    }

    #[test]
    fn parse_update_skips_non_text() {
        let update = serde_json::json!({
            "message": {
                "from": { "id": 7 },
                "chat": { "id": 7 },
                "sticker": { "file_id": "x" }
            }
        });
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn parse_update_skips_missing_sender() {
        let update = serde_json::json!({
            "message": { "chat": { "id": 7 }, "text": "hi" }
        });
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn parse_update_skips_edited_messages() {
        let update = serde_json::json!({
            "edited_message": { "from": { "id": 7 }, "chat": { "id": 7 }, "text": "hi" }
        });
        assert!(parse_update(&update).is_none());
    }

    // ── sendMessage body ────────────────────────────────────────────

    #[test]
    fn send_message_body_plain() {
        let body = send_message_body("42", "hello", None);
        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["text"], "hello");
        assert!(body.get("reply_markup").is_none());
        assert!(body.get("parse_mode").is_none());
    }

    #[test]
    fn send_message_body_with_keyboard() {
        let keyboard = vec![
            vec!["Add Contact".to_string(), "Download VCF".to_string()],
            vec!["Help".to_string()],
        ];
        let body = send_message_body("42", "menu", Some(&keyboard));
        let markup = &body["reply_markup"];
        assert_eq!(markup["resize_keyboard"], true);
        assert_eq!(markup["keyboard"][0][0]["text"], "Add Contact");
        assert_eq!(markup["keyboard"][0][1]["text"], "Download VCF");
        assert_eq!(markup["keyboard"][1][0]["text"], "Help");
    }

    // ── getUpdates replies ──────────────────────────────────────────

    #[test]
    fn poll_results_ok() {
        let data = serde_json::json!({ "ok": true, "result": [{ "update_id": 1 }] });
        assert_eq!(poll_results(&data).unwrap().len(), 1);
    }

    #[test]
    fn poll_results_api_error() {
        let data = serde_json::json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        });
        assert_eq!(poll_results(&data).unwrap_err(), "error 401: Unauthorized");

        let data = serde_json::json!({ "ok": false });
        assert_eq!(
            poll_results(&data).unwrap_err(),
            "error -: no result in response"
        );
    }

    #[tokio::test]
    async fn rejected_poll_backs_off() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        use axum::{Json, Router, extract::State, routing::post};

        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/botrevoked-token/getUpdates",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({
                        "ok": false,
                        "error_code": 401,
                        "description": "Unauthorized"
                    }))
                }),
            )
            .with_state(Arc::clone(&hits));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let ch = channel("revoked-token").with_api_base(format!("http://{addr}"));
        let _stream = ch.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let polls = hits.load(Ordering::SeqCst);
        assert!((1..=2).contains(&polls), "polled {polls} times in 1s");
    }

    // ── Network errors (no server) ──────────────────────────────────

    #[tokio::test]
    async fn send_to_unreachable_server_fails() {
        let ch = channel("fake-token").with_api_base("http://127.0.0.1:1");
        let result = ch.send_to("123456", OutgoingResponse::text("hi")).await;
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));
    }

    #[tokio::test]
    async fn respond_without_chat_id_fails() {
        let ch = channel("fake-token").with_api_base("http://127.0.0.1:1");
        let msg = IncomingMessage::new("telegram", "user123", "hello");
        let result = ch.respond(&msg, OutgoingResponse::text("hi")).await;
        match result {
            Err(ChannelError::SendFailed { reason, .. }) => assert!(reason.contains("chat_id")),
            other => panic!("expected SendFailed, got {other:?}"),
        }
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        // 'é' is two bytes; an odd limit would land mid-character.
        let msg = "é".repeat(10);
        let chunks = split_message(&msg, 5);
        assert!(chunks.iter().all(|c| c.len() <= 5));
        assert_eq!(chunks.concat(), msg);
    }
}
