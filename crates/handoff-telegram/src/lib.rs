// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for the Handoff routing engine.
//!
//! Receives Bot API webhook updates and sends replies through the Bot API
//! over plain HTTPS. One adapter serves every tenant; each outbound call
//! is addressed with the tenant's own bot token.

pub mod handler;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use handoff_config::model::TelegramConfig;
use handoff_core::error::HandoffError;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::traits::channel::ChannelAdapter;
use handoff_core::types::{
    AdapterType, ChannelCredential, ChannelKind, HealthStatus, MediaKind, MediaSpec, MenuSpec,
    NormalizedMessage, SendOptions, WebhookRequest,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{
    AnswerCallbackQueryRequest, ApiResponse, InlineKeyboardButton, InlineKeyboardMarkup,
    SendMessageRequest, SentMessage,
};

/// Telegram Bot API channel adapter.
pub struct TelegramChannel {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramChannel {
    /// Creates a new adapter from the shared `[telegram]` configuration.
    pub fn new(config: &TelegramConfig) -> Result<Self, HandoffError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HandoffError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{token}/{method}", self.base_url)
    }

    /// Calls a Bot API method and unwraps the `{ok, result}` envelope.
    async fn call<B, T>(
        &self,
        credential: &ChannelCredential,
        method: &str,
        body: &B,
    ) -> Result<T, HandoffError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(&credential.token, method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                record_send_error(method);
                HandoffError::DownstreamSend {
                    message: format!("telegram {method} request failed: {e}"),
                    status: e.status().map(|s| s.as_u16()),
                    source: Some(Box::new(e)),
                }
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            record_send_error(method);
            warn!(
                tenant_id = %credential.tenant_id,
                method,
                status = status.as_u16(),
                "telegram API returned error status"
            );
            return Err(HandoffError::DownstreamSend {
                message: format!("telegram {method} returned {status}: {text}"),
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let envelope: ApiResponse<T> =
            serde_json::from_str(&text).map_err(|e| HandoffError::DownstreamSend {
                message: format!("telegram {method} returned an undecodable body: {e}"),
                status: Some(status.as_u16()),
                source: Some(Box::new(e)),
            })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                error_code,
                ..
            } => {
                record_send_error(method);
                Err(HandoffError::DownstreamSend {
                    message: format!(
                        "telegram {method} rejected: {}",
                        description.unwrap_or_else(|| "no description".into())
                    ),
                    status: Some(error_code.unwrap_or(status.as_u16())),
                    source: None,
                })
            }
        }
    }

    async fn send_message(
        &self,
        credential: &ChannelCredential,
        request: &SendMessageRequest<'_>,
    ) -> Result<String, HandoffError> {
        let sent: SentMessage = self.call(credential, "sendMessage", request).await?;
        Ok(sent.message_id.to_string())
    }
}

fn record_send_error(method: &str) {
    metrics::counter!(
        "handoff_channel_send_errors_total",
        "channel" => "telegram",
        "method" => method.to_string()
    )
    .increment(1);
}

/// Bot API method and the name of its file field for each media kind.
fn media_method(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Image => ("sendPhoto", "photo"),
        MediaKind::Document => ("sendDocument", "document"),
        MediaKind::Audio => ("sendAudio", "audio"),
        MediaKind::Voice => ("sendVoice", "voice"),
        MediaKind::Video => ("sendVideo", "video"),
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        // Tokens are per tenant, so there is no single bot to check.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        debug!("telegram channel shut down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn authenticate(
        &self,
        request: &WebhookRequest,
        expected_secret: Option<&str>,
    ) -> Result<(), HandoffError> {
        handler::authenticate(request, expected_secret)
    }

    /// Telegram delivers exactly one update per webhook call.
    fn parse_incoming(&self, body: &[u8]) -> Result<Vec<NormalizedMessage>, HandoffError> {
        Ok(handler::parse_update(body)?.into_iter().collect())
    }

    async fn send_text(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<String, HandoffError> {
        // Callback pseudo-ids and foreign ids cannot be replied to.
        let reply_to_message_id = options
            .reply_to
            .as_deref()
            .and_then(|id| id.parse::<i64>().ok());

        self.send_message(
            credential,
            &SendMessageRequest {
                chat_id,
                text,
                reply_to_message_id,
                reply_markup: None,
            },
        )
        .await
    }

    async fn send_menu(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        menu: &MenuSpec,
    ) -> Result<String, HandoffError> {
        // One button per row renders well on narrow clients.
        let keyboard = menu
            .buttons
            .iter()
            .map(|b| {
                vec![InlineKeyboardButton {
                    text: b.label.clone(),
                    callback_data: Some(b.payload.clone()),
                }]
            })
            .collect();

        self.send_message(
            credential,
            &SendMessageRequest {
                chat_id,
                text: &menu.text,
                reply_to_message_id: None,
                reply_markup: Some(InlineKeyboardMarkup {
                    inline_keyboard: keyboard,
                }),
            },
        )
        .await
    }

    async fn send_media(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        media: &MediaSpec,
    ) -> Result<String, HandoffError> {
        let (method, field) = media_method(media.kind);
        let mut body = serde_json::Map::new();
        body.insert("chat_id".into(), chat_id.into());
        body.insert(field.into(), media.url.as_str().into());
        if let Some(caption) = media.caption.as_deref() {
            body.insert("caption".into(), caption.into());
        }

        let sent: SentMessage = self.call(credential, method, &body).await?;
        Ok(sent.message_id.to_string())
    }

    async fn acknowledge_callback(
        &self,
        credential: &ChannelCredential,
        callback_id: &str,
    ) -> Result<(), HandoffError> {
        let _: bool = self
            .call(
                credential,
                "answerCallbackQuery",
                &AnswerCallbackQueryRequest {
                    callback_query_id: callback_id,
                },
            )
            .await?;
        Ok(())
    }
}
