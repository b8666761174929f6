// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API channel adapter for the Handoff routing engine.
//!
//! Inbound webhooks are authenticated with the `X-Hub-Signature-256` HMAC
//! keyed by the tenant's webhook secret. Outbound messages go to
//! `POST {base}/{version}/{phone_number_id}/messages` with the tenant's
//! access token; the phone-number id is the credential's `account_id`.

pub mod handler;
pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use handoff_config::model::WhatsAppConfig;
use handoff_core::error::HandoffError;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::traits::channel::ChannelAdapter;
use handoff_core::types::{
    AdapterType, ChannelCredential, ChannelKind, HealthStatus, MediaKind, MediaSpec, MenuSpec,
    NormalizedMessage, SendOptions, WebhookRequest,
};
use tracing::{debug, warn};

use crate::types::{
    Interactive, InteractiveAction, InteractiveBody, MediaLink, OutboundContent, OutboundContext,
    OutboundMessage, OutboundText, ReplyButton, ReplyButtonBody, SendResponse,
};

/// Cloud API limit on reply buttons per interactive message.
pub const MAX_REPLY_BUTTONS: usize = 3;

/// Cloud API limit on a reply button title, in characters.
pub const MAX_BUTTON_TITLE_CHARS: usize = 20;

/// WhatsApp Cloud API channel adapter.
pub struct WhatsAppChannel {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
}

impl WhatsAppChannel {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, HandoffError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HandoffError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        })
    }

    fn messages_url(&self, credential: &ChannelCredential) -> Result<String, HandoffError> {
        let phone_number_id = credential.account_id.as_deref().ok_or_else(|| {
            HandoffError::Config(format!(
                "tenant {} whatsapp credential has no phone number id",
                credential.tenant_id
            ))
        })?;
        Ok(format!(
            "{}/{}/{phone_number_id}/messages",
            self.base_url, self.api_version
        ))
    }

    async fn post(
        &self,
        credential: &ChannelCredential,
        message: &OutboundMessage<'_>,
    ) -> Result<String, HandoffError> {
        let url = self.messages_url(credential)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&credential.token)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                record_send_error();
                HandoffError::DownstreamSend {
                    message: format!("whatsapp send request failed: {e}"),
                    status: None,
                    source: Some(Box::new(e)),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            record_send_error();
            warn!(
                tenant_id = %credential.tenant_id,
                status = status.as_u16(),
                "whatsapp API returned error status"
            );
            return Err(HandoffError::DownstreamSend {
                message: format!("whatsapp send failed ({status}): {body}"),
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let sent: SendResponse =
            response
                .json()
                .await
                .map_err(|e| HandoffError::DownstreamSend {
                    message: format!("whatsapp send returned an undecodable body: {e}"),
                    status: Some(status.as_u16()),
                    source: Some(Box::new(e)),
                })?;

        sent.messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| HandoffError::DownstreamSend {
                message: "whatsapp send response carried no message id".into(),
                status: Some(status.as_u16()),
                source: None,
            })
    }
}

fn record_send_error() {
    metrics::counter!("handoff_channel_send_errors_total", "channel" => "whatsapp").increment(1);
}

fn truncate_title(label: &str) -> String {
    label.chars().take(MAX_BUTTON_TITLE_CHARS).collect()
}

#[async_trait]
impl PluginAdapter for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
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
        debug!("whatsapp channel shut down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Whatsapp
    }

    fn authenticate(
        &self,
        request: &WebhookRequest,
        expected_secret: Option<&str>,
    ) -> Result<(), HandoffError> {
        handler::authenticate(request, expected_secret)
    }

    fn parse_incoming(&self, body: &[u8]) -> Result<Vec<NormalizedMessage>, HandoffError> {
        handler::parse_payload(body)
    }

    async fn send_text(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<String, HandoffError> {
        let mut message = OutboundMessage::new(
            chat_id,
            OutboundContent::Text {
                text: OutboundText {
                    body: text.to_string(),
                    preview_url: false,
                },
            },
        );
        message.context = options.reply_to.as_ref().map(|id| OutboundContext {
            message_id: id.clone(),
        });
        self.post(credential, &message).await
    }

    async fn send_menu(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        menu: &MenuSpec,
    ) -> Result<String, HandoffError> {
        if menu.buttons.len() > MAX_REPLY_BUTTONS {
            debug!(
                count = menu.buttons.len(),
                "menu exceeds whatsapp button limit; extra buttons dropped"
            );
        }
        let buttons = menu
            .buttons
            .iter()
            .take(MAX_REPLY_BUTTONS)
            .map(|b| ReplyButton {
                kind: "reply",
                reply: ReplyButtonBody {
                    id: b.payload.clone(),
                    title: truncate_title(&b.label),
                },
            })
            .collect();

        let message = OutboundMessage::new(
            chat_id,
            OutboundContent::Interactive {
                interactive: Interactive {
                    kind: "button",
                    body: InteractiveBody {
                        text: menu.text.clone(),
                    },
                    action: InteractiveAction { buttons },
                },
            },
        );
        self.post(credential, &message).await
    }

    async fn send_media(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        media: &MediaSpec,
    ) -> Result<String, HandoffError> {
        let link = |caption: Option<String>| MediaLink {
            link: media.url.clone(),
            caption,
        };
        // Audio messages cannot carry a caption.
        let content = match media.kind {
            MediaKind::Image => OutboundContent::Image {
                image: link(media.caption.clone()),
            },
            MediaKind::Document => OutboundContent::Document {
                document: link(media.caption.clone()),
            },
            MediaKind::Video => OutboundContent::Video {
                video: link(media.caption.clone()),
            },
            MediaKind::Audio | MediaKind::Voice => OutboundContent::Audio { audio: link(None) },
        };
        self.post(credential, &OutboundMessage::new(chat_id, content))
            .await
    }

    fn verify_subscription(
        &self,
        query: &HashMap<String, String>,
        credential: &ChannelCredential,
    ) -> Option<String> {
        let verify_token = credential.webhook_secret.as_deref()?;
        handler::verify_subscription(query, verify_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::types::MenuButton;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> ChannelCredential {
        ChannelCredential {
            tenant_id: "t1".into(),
            channel: ChannelKind::Whatsapp,
            token: "EAAG-test".into(),
            webhook_secret: Some("app-secret".into()),
            account_id: Some("1098765".into()),
        }
    }

    fn channel_for(server: &MockServer) -> WhatsAppChannel {
        WhatsAppChannel::new(&WhatsAppConfig {
            api_base_url: server.uri(),
            api_version: "v19.0".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn sent_ok(id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messaging_product": "whatsapp",
            "contacts": [{"input": "15550001111", "wa_id": "15550001111"}],
            "messages": [{"id": id}]
        }))
    }

    #[test]
    fn titles_are_truncated_on_char_boundaries() {
        assert_eq!(truncate_title("Talk to an agent"), "Talk to an agent");
        let long = "Hablar con un agente ahora";
        assert_eq!(truncate_title(long).chars().count(), 20);
        assert_eq!(truncate_title(&"ñ".repeat(25)), "ñ".repeat(20));
    }

    #[tokio::test]
    async fn send_text_uses_bearer_token_and_phone_number_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/1098765/messages"))
            .and(header("authorization", "Bearer EAAG-test"))
            .and(body_partial_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "15550001111",
                "type": "text",
                "text": {"body": "hello"},
                "context": {"message_id": "wamid.IN"}
            })))
            .respond_with(sent_ok("wamid.OUT"))
            .expect(1)
            .mount(&server)
            .await;

        let id = channel_for(&server)
            .send_text(
                &credential(),
                "15550001111",
                "hello",
                &SendOptions {
                    reply_to: Some("wamid.IN".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(id, "wamid.OUT");
    }

    #[tokio::test]
    async fn send_menu_caps_buttons_and_truncates_titles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/1098765/messages"))
            .and(body_partial_json(serde_json::json!({
                "type": "interactive",
                "interactive": {
                    "type": "button",
                    "body": {"text": "How can we help?"},
                    "action": {"buttons": [
                        {"type": "reply", "reply": {"id": "menu:support", "title": "Get support"}},
                        {"type": "reply", "reply": {"id": "menu:agent", "title": "Talk to a specialist"}},
                        {"type": "reply", "reply": {"id": "menu:faq", "title": "FAQ"}}
                    ]}
                }
            })))
            .respond_with(sent_ok("wamid.MENU"))
            .expect(1)
            .mount(&server)
            .await;

        let button = |label: &str, payload: &str| MenuButton {
            label: label.into(),
            payload: payload.into(),
        };
        let menu = MenuSpec {
            text: "How can we help?".into(),
            buttons: vec![
                button("Get support", "menu:support"),
                button("Talk to a specialist right now", "menu:agent"),
                button("FAQ", "menu:faq"),
                button("Billing", "menu:billing"),
            ],
        };
        let id = channel_for(&server)
            .send_menu(&credential(), "15550001111", &menu)
            .await
            .unwrap();
        assert_eq!(id, "wamid.MENU");
    }

    #[tokio::test]
    async fn send_media_links_by_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "type": "image",
                "image": {"link": "https://cdn.example.com/a.png", "caption": "diagram"}
            })))
            .respond_with(sent_ok("wamid.IMG"))
            .expect(1)
            .mount(&server)
            .await;

        let spec = MediaSpec {
            kind: MediaKind::Image,
            url: "https://cdn.example.com/a.png".into(),
            caption: Some("diagram".into()),
        };
        let id = channel_for(&server)
            .send_media(&credential(), "15550001111", &spec)
            .await
            .unwrap();
        assert_eq!(id, "wamid.IMG");
    }

    #[tokio::test]
    async fn error_status_is_downstream_send_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Invalid OAuth access token", "code": 190}
            })))
            .mount(&server)
            .await;

        let err = channel_for(&server)
            .send_text(&credential(), "1", "x", &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandoffError::DownstreamSend {
                status: Some(401),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_phone_number_id_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sent_ok("never"))
            .expect(0)
            .mount(&server)
            .await;

        let mut cred = credential();
        cred.account_id = None;
        let err = channel_for(&server)
            .send_text(&cred, "1", "x", &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Config(_)));
    }

    #[test]
    fn verify_subscription_uses_webhook_secret() {
        let channel = WhatsAppChannel::new(&WhatsAppConfig::default()).unwrap();
        let query: HashMap<String, String> = [
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "app-secret"),
            ("hub.challenge", "987"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(
            channel.verify_subscription(&query, &credential()).as_deref(),
            Some("987")
        );

        let mut no_secret = credential();
        no_secret.webhook_secret = None;
        assert_eq!(channel.verify_subscription(&query, &no_secret), None);
    }
}
