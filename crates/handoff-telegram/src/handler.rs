// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook authentication and update normalization.
//!
//! Converts a Telegram [`Update`] into a channel-agnostic
//! [`NormalizedMessage`]. Updates the engine cannot act on (stickers,
//! locations, edited messages, channel posts) normalize to `None`.

use handoff_core::error::HandoffError;
use handoff_core::types::{
    InboundKind, MediaKind, MediaRef, NormalizedMessage, SenderProfile, WebhookRequest,
    now_timestamp,
};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::types::{CallbackQuery, FileMeta, TgMessage, Update, User};

/// Header Telegram sets when the webhook was registered with a `secret_token`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Generic header accepted for proxies that forward under a neutral name.
pub const GENERIC_SECRET_HEADER: &str = "x-webhook-secret-token";

/// Checks the webhook secret header against the tenant's configured secret.
pub fn authenticate(
    request: &WebhookRequest,
    expected_secret: Option<&str>,
) -> Result<(), HandoffError> {
    let Some(expected) = expected_secret else {
        return Ok(());
    };

    let provided = request
        .header(SECRET_HEADER)
        .or_else(|| request.header(GENERIC_SECRET_HEADER))
        .ok_or_else(|| HandoffError::Authentication("missing webhook secret header".into()))?;

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(HandoffError::Authentication(
            "webhook secret does not match".into(),
        ))
    }
}

/// Decodes a raw update body. Invalid JSON is a [`HandoffError::MalformedPayload`].
pub fn parse_update(body: &[u8]) -> Result<Option<NormalizedMessage>, HandoffError> {
    let update: Update = serde_json::from_slice(body)
        .map_err(|e| HandoffError::MalformedPayload(format!("telegram update: {e}")))?;

    if let Some(query) = update.callback_query.as_ref() {
        return Ok(normalize_callback(query));
    }
    if let Some(msg) = update.message.as_ref() {
        return Ok(normalize_message(msg));
    }

    debug!(update_id = update.update_id, "ignoring non-message update");
    Ok(None)
}

fn sender_profile(user: Option<&User>) -> SenderProfile {
    SenderProfile {
        display_name: user.and_then(User::display_name),
        username: user.and_then(|u| u.username.clone()),
    }
}

fn unix_to_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(now_timestamp)
}

fn media_ref(kind: MediaKind, meta: &FileMeta) -> MediaRef {
    MediaRef {
        kind,
        file_id: meta.file_id.clone(),
        mime_type: meta.mime_type.clone(),
        file_name: meta.file_name.clone(),
    }
}

/// Extracts the media attachment, preferring the largest photo size.
fn extract_media(msg: &TgMessage) -> Option<MediaRef> {
    if let Some(largest) = msg.photo.as_ref().and_then(|sizes| sizes.last()) {
        return Some(MediaRef {
            kind: MediaKind::Image,
            file_id: largest.file_id.clone(),
            mime_type: Some("image/jpeg".into()),
            file_name: None,
        });
    }

    [
        (MediaKind::Document, msg.document.as_ref()),
        (MediaKind::Audio, msg.audio.as_ref()),
        (MediaKind::Voice, msg.voice.as_ref()),
        (MediaKind::Video, msg.video.as_ref()),
    ]
    .into_iter()
    .find_map(|(kind, meta)| meta.map(|m| media_ref(kind, m)))
}

fn normalize_message(msg: &TgMessage) -> Option<NormalizedMessage> {
    let (body, kind, media) = if let Some(text) = msg.text.as_ref() {
        (text.clone(), InboundKind::Text, None)
    } else if let Some(media) = extract_media(msg) {
        let body = msg.caption.clone().unwrap_or_default();
        (body, InboundKind::Media(media.kind), Some(media))
    } else {
        debug!(msg_id = msg.message_id, "ignoring unsupported message type");
        return None;
    };

    Some(NormalizedMessage {
        platform_message_id: msg.message_id.to_string(),
        chat_id: msg.chat.id.to_string(),
        sender: sender_profile(msg.from.as_ref()),
        body,
        kind,
        media,
        sent_at: unix_to_timestamp(msg.date),
    })
}

/// Normalizes a button press.
///
/// The body is the label of the pressed button when the menu message is
/// attached to the query, so the transcript reads like what the customer saw.
fn normalize_callback(query: &CallbackQuery) -> Option<NormalizedMessage> {
    let Some(payload) = query.data.clone() else {
        debug!(callback_id = %query.id, "ignoring callback without data");
        return None;
    };

    let chat_id = query
        .message
        .as_ref()
        .map(|m| m.chat.id)
        .unwrap_or(query.from.id);

    let label = query
        .message
        .as_ref()
        .and_then(|m| m.reply_markup.as_ref())
        .and_then(|markup| {
            markup
                .inline_keyboard
                .iter()
                .flatten()
                .find(|b| b.callback_data.as_deref() == Some(payload.as_str()))
                .map(|b| b.text.clone())
        });

    Some(NormalizedMessage {
        // Callback ids live in their own namespace; prefix so they never
        // collide with a message id in the same chat.
        platform_message_id: format!("cb:{}", query.id),
        chat_id: chat_id.to_string(),
        sender: sender_profile(Some(&query.from)),
        body: label.unwrap_or_else(|| payload.clone()),
        kind: InboundKind::Callback {
            callback_id: Some(query.id.clone()),
            payload,
        },
        media: None,
        sent_at: now_timestamp(),
    })
}
