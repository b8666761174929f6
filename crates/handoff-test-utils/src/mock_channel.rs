// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` decodes a small JSON payload ([`MockInbound`]) instead of a
//! real platform update and captures every outbound call for assertions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use handoff_core::HandoffError;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::traits::channel::ChannelAdapter;
use handoff_core::types::{
    AdapterType, ChannelCredential, ChannelKind, HealthStatus, InboundKind, MediaSpec, MenuSpec,
    NormalizedMessage, SendOptions, SenderProfile, WebhookRequest,
};

/// Header carrying the shared secret in mock deliveries.
pub const SECRET_HEADER: &str = "x-webhook-secret-token";

/// Test payload understood by [`MockChannel::parse_incoming`].
///
/// A payload without `message_id` is "not actionable" and parses to nothing.
/// A JSON array of payloads is a batched delivery (see [`MockInbound::batch`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockInbound {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub callback_payload: Option<String>,
    #[serde(default)]
    pub callback_id: Option<String>,
}

impl MockInbound {
    pub fn text(message_id: &str, chat_id: &str, text: &str) -> Self {
        Self {
            message_id: Some(message_id.to_string()),
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            sender_name: Some("Test Customer".to_string()),
            ..Self::default()
        }
    }

    /// A button press carrying `payload`, labelled `label`.
    pub fn callback(message_id: &str, chat_id: &str, label: &str, payload: &str) -> Self {
        Self {
            callback_payload: Some(payload.to_string()),
            callback_id: Some(format!("cbq-{message_id}")),
            ..Self::text(message_id, chat_id, label)
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Body of one webhook call carrying all of `messages`.
    pub fn batch(messages: &[MockInbound]) -> Vec<u8> {
        serde_json::to_vec(messages).unwrap_or_default()
    }

    fn normalize(self) -> Option<NormalizedMessage> {
        let message_id = self.message_id?;
        let kind = match self.callback_payload {
            Some(payload) => InboundKind::Callback {
                callback_id: self.callback_id,
                payload,
            },
            None => InboundKind::Text,
        };
        Some(NormalizedMessage {
            platform_message_id: message_id,
            chat_id: self.chat_id,
            sender: SenderProfile {
                display_name: self.sender_name,
                username: None,
            },
            body: self.text,
            kind,
            media: None,
            sent_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MockDelivery {
    Batch(Vec<MockInbound>),
    Single(MockInbound),
}

/// One captured outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentItem {
    Text { chat_id: String, text: String },
    Menu { chat_id: String, menu: MenuSpec },
    Media { chat_id: String, media: MediaSpec },
}

impl SentItem {
    pub fn chat_id(&self) -> &str {
        match self {
            SentItem::Text { chat_id, .. }
            | SentItem::Menu { chat_id, .. }
            | SentItem::Media { chat_id, .. } => chat_id,
        }
    }

    /// The text of a text message, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SentItem::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn is_menu(&self) -> bool {
        matches!(self, SentItem::Menu { .. })
    }
}

/// A mock messaging channel for testing.
pub struct MockChannel {
    kind: ChannelKind,
    sent: Arc<Mutex<Vec<SentItem>>>,
    acked_callbacks: Arc<Mutex<Vec<String>>>,
    fail_sends: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
    next_id: AtomicUsize,
}

impl MockChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            sent: Arc::new(Mutex::new(Vec::new())),
            acked_callbacks: Arc::new(Mutex::new(Vec::new())),
            fail_sends: AtomicBool::new(false),
            send_delay: Mutex::new(None),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Get all calls that reached `send_*` successfully.
    pub async fn sent_messages(&self) -> Vec<SentItem> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn acked_callbacks(&self) -> Vec<String> {
        self.acked_callbacks.lock().await.clone()
    }

    /// Make every send fail with a 502 from the "platform".
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    /// Delay every send, to exercise send timeouts.
    pub async fn set_send_delay(&self, delay: Option<Duration>) {
        *self.send_delay.lock().await = delay;
    }

    async fn record(&self, item: SentItem) -> Result<String, HandoffError> {
        let delay = *self.send_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(HandoffError::DownstreamSend {
                message: "mock platform returned 502".into(),
                status: Some(502),
                source: None,
            });
        }
        self.sent.lock().await.push(item);
        Ok(format!("mock-out-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn authenticate(
        &self,
        request: &WebhookRequest,
        expected_secret: Option<&str>,
    ) -> Result<(), HandoffError> {
        match expected_secret {
            None => Ok(()),
            Some(expected) if request.header(SECRET_HEADER) == Some(expected) => Ok(()),
            Some(_) => Err(HandoffError::Authentication("secret mismatch".into())),
        }
    }

    fn parse_incoming(&self, body: &[u8]) -> Result<Vec<NormalizedMessage>, HandoffError> {
        let delivery: MockDelivery = serde_json::from_slice(body)
            .map_err(|e| HandoffError::MalformedPayload(e.to_string()))?;
        let inbound = match delivery {
            MockDelivery::Batch(batch) => batch,
            MockDelivery::Single(single) => vec![single],
        };
        Ok(inbound.into_iter().filter_map(MockInbound::normalize).collect())
    }

    async fn send_text(
        &self,
        _credential: &ChannelCredential,
        chat_id: &str,
        text: &str,
        _options: &SendOptions,
    ) -> Result<String, HandoffError> {
        self.record(SentItem::Text {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn send_menu(
        &self,
        _credential: &ChannelCredential,
        chat_id: &str,
        menu: &MenuSpec,
    ) -> Result<String, HandoffError> {
        self.record(SentItem::Menu {
            chat_id: chat_id.to_string(),
            menu: menu.clone(),
        })
        .await
    }

    async fn send_media(
        &self,
        _credential: &ChannelCredential,
        chat_id: &str,
        media: &MediaSpec,
    ) -> Result<String, HandoffError> {
        self.record(SentItem::Media {
            chat_id: chat_id.to_string(),
            media: media.clone(),
        })
        .await
    }

    async fn acknowledge_callback(
        &self,
        _credential: &ChannelCredential,
        callback_id: &str,
    ) -> Result<(), HandoffError> {
        self.acked_callbacks
            .lock()
            .await
            .push(callback_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> ChannelCredential {
        ChannelCredential {
            tenant_id: "t1".into(),
            channel: ChannelKind::Telegram,
            token: "token".into(),
            webhook_secret: None,
            account_id: None,
        }
    }

    #[test]
    fn parses_text_and_callbacks() {
        let channel = MockChannel::new(ChannelKind::Telegram);
        let text = channel
            .parse_incoming(&MockInbound::text("m1", "555", "hi").to_bytes())
            .unwrap();
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].kind, InboundKind::Text);
        assert_eq!(text[0].chat_id, "555");

        let press = channel
            .parse_incoming(&MockInbound::callback("m2", "555", "FAQ", "menu:faq").to_bytes())
            .unwrap();
        assert_eq!(press[0].callback_payload(), Some("menu:faq"));
        assert_eq!(press[0].body, "FAQ");
    }

    #[test]
    fn batches_keep_order_and_skip_unactionable_entries() {
        let channel = MockChannel::new(ChannelKind::Whatsapp);
        let body = MockInbound::batch(&[
            MockInbound::text("a", "555", "first"),
            MockInbound::default(),
            MockInbound::text("b", "555", "second"),
        ]);
        let parsed = channel.parse_incoming(&body).unwrap();
        let ids: Vec<_> = parsed.iter().map(|m| m.platform_message_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn missing_id_is_not_actionable_and_garbage_is_malformed() {
        let channel = MockChannel::new(ChannelKind::Telegram);
        assert!(channel.parse_incoming(b"{}").unwrap().is_empty());
        assert!(matches!(
            channel.parse_incoming(b"not json"),
            Err(HandoffError::MalformedPayload(_))
        ));
    }

    #[test]
    fn authenticates_against_the_secret_header() {
        let channel = MockChannel::new(ChannelKind::Telegram);
        let good = WebhookRequest::new(Vec::new()).with_header(SECRET_HEADER, "s3cret");
        let bad = WebhookRequest::new(Vec::new()).with_header(SECRET_HEADER, "nope");
        assert!(channel.authenticate(&good, Some("s3cret")).is_ok());
        assert!(channel.authenticate(&bad, Some("s3cret")).is_err());
        assert!(channel.authenticate(&bad, None).is_ok());
    }

    #[tokio::test]
    async fn captures_sends_and_can_fail() {
        let channel = MockChannel::new(ChannelKind::Telegram);
        let id = channel
            .send_text(&credential(), "555", "hello", &SendOptions::default())
            .await
            .unwrap();
        assert_eq!(id, "mock-out-1");
        assert_eq!(channel.sent_messages().await[0].as_text(), Some("hello"));

        channel.set_failing(true);
        let err = channel
            .send_text(&credential(), "555", "again", &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::DownstreamSend { status: Some(502), .. }));
        assert_eq!(channel.sent_count().await, 1);
    }
}
