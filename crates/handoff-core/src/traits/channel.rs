// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for chat platform integrations (Telegram, WhatsApp).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::HandoffError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelCredential, ChannelKind, MediaSpec, MenuSpec, NormalizedMessage, SendOptions,
    WebhookRequest,
};

/// Translates platform webhooks into [`NormalizedMessage`]s and normalized
/// sends into platform API calls.
///
/// A single adapter instance serves every tenant: outbound calls carry the
/// tenant's [`ChannelCredential`] instead of the adapter holding a token.
/// Send methods return the platform id of the delivered message.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Platform this adapter speaks.
    fn kind(&self) -> ChannelKind;

    /// Verifies the webhook against the tenant's configured secret.
    ///
    /// `expected_secret = None` means the tenant opted out of verification
    /// and every request is accepted.
    fn authenticate(
        &self,
        request: &WebhookRequest,
        expected_secret: Option<&str>,
    ) -> Result<(), HandoffError>;

    /// Decodes a raw webhook body into every actionable message it carries,
    /// in payload order.
    ///
    /// Returns an empty list for payloads that carry nothing actionable
    /// (unsupported update types, status callbacks, unknown media) and
    /// [`HandoffError::MalformedPayload`] only when the body is not a
    /// platform payload at all.
    fn parse_incoming(&self, body: &[u8]) -> Result<Vec<NormalizedMessage>, HandoffError>;

    async fn send_text(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<String, HandoffError>;

    async fn send_menu(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        menu: &MenuSpec,
    ) -> Result<String, HandoffError>;

    async fn send_media(
        &self,
        credential: &ChannelCredential,
        chat_id: &str,
        media: &MediaSpec,
    ) -> Result<String, HandoffError>;

    /// Stops the platform's loading indicator on a pressed button.
    async fn acknowledge_callback(
        &self,
        _credential: &ChannelCredential,
        _callback_id: &str,
    ) -> Result<(), HandoffError> {
        Ok(())
    }

    /// Answers a subscription handshake (query parameters of a GET on the
    /// webhook URL). Returns the body to echo back, or `None` to refuse.
    fn verify_subscription(
        &self,
        _query: &HashMap<String, String>,
        _credential: &ChannelCredential,
    ) -> Option<String> {
        None
    }
}
