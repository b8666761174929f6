// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook signature checks, the subscription handshake, and payload
//! normalization for the WhatsApp Cloud API.

use std::collections::HashMap;

use handoff_core::error::HandoffError;
use handoff_core::types::{
    InboundKind, MediaKind, MediaRef, NormalizedMessage, SenderProfile, WebhookRequest,
    now_timestamp,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::types::{MediaObject, WaContact, WebhookMessage, WebhookPayload};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const GENERIC_SECRET_HEADER: &str = "x-webhook-secret-token";

/// Verifies `X-Hub-Signature-256: sha256=<hex>` over the raw body.
///
/// Requests relayed by a proxy that cannot re-sign may instead carry the
/// shared secret in `X-Webhook-Secret-Token`.
pub fn authenticate(
    request: &WebhookRequest,
    expected_secret: Option<&str>,
) -> Result<(), HandoffError> {
    let Some(secret) = expected_secret else {
        return Ok(());
    };

    if let Some(header) = request.header(SIGNATURE_HEADER) {
        return verify_signature(secret.as_bytes(), &request.body, header);
    }

    match request.header(GENERIC_SECRET_HEADER) {
        Some(provided) if bool::from(provided.as_bytes().ct_eq(secret.as_bytes())) => Ok(()),
        Some(_) => Err(HandoffError::Authentication(
            "webhook secret does not match".into(),
        )),
        None => Err(HandoffError::Authentication(
            "missing X-Hub-Signature-256 header".into(),
        )),
    }
}

fn verify_signature(secret: &[u8], body: &[u8], header: &str) -> Result<(), HandoffError> {
    let hex_digest = header
        .strip_prefix("sha256=")
        .ok_or_else(|| HandoffError::Authentication("signature is not sha256".into()))?;
    let expected = hex::decode(hex_digest)
        .map_err(|_| HandoffError::Authentication("signature is not valid hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| HandoffError::Internal(format!("hmac key: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| HandoffError::Authentication("signature does not match body".into()))
}

/// Computes the `sha256=<hex>` signature Meta would send for `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, HandoffError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| HandoffError::Internal(format!("hmac key: {e}")))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Answers the `hub.mode=subscribe` GET handshake.
pub fn verify_subscription(query: &HashMap<String, String>, verify_token: &str) -> Option<String> {
    let mode = query.get("hub.mode")?;
    let token = query.get("hub.verify_token")?;
    let challenge = query.get("hub.challenge")?;

    if mode == "subscribe" && bool::from(token.as_bytes().ct_eq(verify_token.as_bytes())) {
        Some(challenge.clone())
    } else {
        None
    }
}

/// Decodes a webhook body into every actionable message it carries.
///
/// Meta batches deliveries: one payload may hold several entries, changes
/// and messages. They come back flattened in payload order.
pub fn parse_payload(body: &[u8]) -> Result<Vec<NormalizedMessage>, HandoffError> {
    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|e| HandoffError::MalformedPayload(format!("whatsapp webhook: {e}")))?;

    let messages: Vec<NormalizedMessage> = payload
        .entry
        .iter()
        .flat_map(|entry| entry.changes.iter())
        .filter_map(|change| change.value.as_ref())
        .flat_map(|value| {
            value
                .messages
                .iter()
                .filter_map(|m| normalize(m, &value.contacts))
        })
        .collect();

    if messages.is_empty() {
        debug!(object = ?payload.object, "no actionable whatsapp message in payload");
    }
    Ok(messages)
}

fn unix_str_to_timestamp(secs: &str) -> String {
    secs.parse::<i64>()
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(now_timestamp)
}

fn media_ref(kind: MediaKind, media: &MediaObject) -> MediaRef {
    MediaRef {
        kind,
        file_id: media.id.clone(),
        mime_type: media.mime_type.clone(),
        file_name: media.filename.clone(),
    }
}

fn normalize(msg: &WebhookMessage, contacts: &[WaContact]) -> Option<NormalizedMessage> {
    let (body, kind, media) = match msg.kind.as_str() {
        "text" => (msg.text.as_ref()?.body.clone(), InboundKind::Text, None),
        "interactive" => {
            let reply = msg.interactive.as_ref()?;
            let choice = reply.button_reply.as_ref().or(reply.list_reply.as_ref())?;
            (
                choice.title.clone(),
                InboundKind::Callback {
                    callback_id: None,
                    payload: choice.id.clone(),
                },
                None,
            )
        }
        "button" => {
            let button = msg.button.as_ref()?;
            (
                button.text.clone(),
                InboundKind::Callback {
                    callback_id: None,
                    payload: button.payload.clone(),
                },
                None,
            )
        }
        "image" | "document" | "audio" | "video" => {
            let (kind, object) = match msg.kind.as_str() {
                "image" => (MediaKind::Image, msg.image.as_ref()?),
                "document" => (MediaKind::Document, msg.document.as_ref()?),
                "video" => (MediaKind::Video, msg.video.as_ref()?),
                _ => {
                    let audio = msg.audio.as_ref()?;
                    let kind = if audio.voice {
                        MediaKind::Voice
                    } else {
                        MediaKind::Audio
                    };
                    (kind, audio)
                }
            };
            let body = object.caption.clone().unwrap_or_default();
            (body, InboundKind::Media(kind), Some(media_ref(kind, object)))
        }
        other => {
            debug!(msg_id = %msg.id, kind = other, "ignoring unsupported whatsapp message type");
            return None;
        }
    };

    let contact = contacts
        .iter()
        .find(|c| c.wa_id.as_deref() == Some(msg.from.as_str()))
        .or_else(|| contacts.first());

    Some(NormalizedMessage {
        platform_message_id: msg.id.clone(),
        chat_id: msg.from.clone(),
        sender: SenderProfile {
            display_name: contact
                .and_then(|c| c.profile.as_ref())
                .and_then(|p| p.name.clone()),
            username: None,
        },
        body,
        kind,
        media,
        sent_at: unix_str_to_timestamp(&msg.timestamp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(message: &str) -> String {
        format!(
            r#"{{"object":"whatsapp_business_account","entry":[{{"id":"biz","changes":[{{
                "field":"messages","value":{{
                  "messaging_product":"whatsapp",
                  "contacts":[{{"wa_id":"15550001111","profile":{{"name":"Rita"}}}}],
                  "messages":[{message}]}}}}]}}]}}"#
        )
    }

    fn parse(message: &str) -> Option<NormalizedMessage> {
        let mut messages = parse_payload(wrap(message).as_bytes()).unwrap();
        assert!(messages.len() <= 1);
        messages.pop()
    }

    #[test]
    fn text_message_normalizes_with_profile_name() {
        let msg = parse(
            r#"{"id":"wamid.A","from":"15550001111","timestamp":"1700000000",
                "type":"text","text":{"body":"need help"}}"#,
        )
        .unwrap();
        assert_eq!(msg.platform_message_id, "wamid.A");
        assert_eq!(msg.chat_id, "15550001111");
        assert_eq!(msg.body, "need help");
        assert_eq!(msg.kind, InboundKind::Text);
        assert_eq!(msg.sender.display_name.as_deref(), Some("Rita"));
        assert_eq!(msg.sent_at, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn button_reply_becomes_callback() {
        let msg = parse(
            r#"{"id":"wamid.B","from":"15550001111","timestamp":"1700000000",
                "type":"interactive","interactive":{"type":"button_reply",
                "button_reply":{"id":"menu:support","title":"Get support"}}}"#,
        )
        .unwrap();
        assert!(msg.is_callback());
        assert_eq!(msg.callback_payload(), Some("menu:support"));
        assert_eq!(msg.body, "Get support");
    }

    #[test]
    fn list_reply_becomes_callback() {
        let msg = parse(
            r#"{"id":"wamid.C","from":"15550001111","timestamp":"1",
                "type":"interactive","interactive":{"type":"list_reply",
                "list_reply":{"id":"menu:faq","title":"FAQ"}}}"#,
        )
        .unwrap();
        assert_eq!(msg.callback_payload(), Some("menu:faq"));
    }

    #[test]
    fn voice_note_is_voice_media() {
        let msg = parse(
            r#"{"id":"wamid.D","from":"15550001111","timestamp":"1",
                "type":"audio","audio":{"id":"media-1","mime_type":"audio/ogg","voice":true}}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, InboundKind::Media(MediaKind::Voice));
        assert_eq!(msg.media.unwrap().file_id, "media-1");
    }

    #[test]
    fn image_caption_becomes_body() {
        let msg = parse(
            r#"{"id":"wamid.E","from":"15550001111","timestamp":"1",
                "type":"image","image":{"id":"img-1","mime_type":"image/jpeg","caption":"broken"}}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, InboundKind::Media(MediaKind::Image));
        assert_eq!(msg.body, "broken");
    }

    #[test]
    fn unsupported_types_and_statuses_are_not_actionable() {
        assert!(
            parse(r#"{"id":"wamid.F","from":"1","timestamp":"1","type":"sticker","sticker":{"id":"s"}}"#)
                .is_none()
        );

        let statuses = br#"{"object":"whatsapp_business_account","entry":[{"changes":[{"value":
            {"statuses":[{"id":"wamid.1","status":"read"}]}}]}]}"#;
        assert!(parse_payload(statuses).unwrap().is_empty());
    }

    #[test]
    fn batched_messages_are_all_returned_in_order() {
        let body = wrap(
            r#"{"id":"wamid.A","from":"15550001111","timestamp":"1","type":"text","text":{"body":"first"}},
               {"id":"wamid.S","from":"15550001111","timestamp":"1","type":"sticker","sticker":{"id":"s"}},
               {"id":"wamid.B","from":"15550001111","timestamp":"2","type":"text","text":{"body":"second"}}"#,
        );
        let messages = parse_payload(body.as_bytes()).unwrap();
        let ids: Vec<_> = messages
            .iter()
            .map(|m| (m.platform_message_id.as_str(), m.body.as_str()))
            .collect();
        assert_eq!(ids, [("wamid.A", "first"), ("wamid.B", "second")]);
    }

    #[test]
    fn messages_across_entries_and_changes_are_flattened() {
        let body = br#"{"object":"whatsapp_business_account","entry":[
            {"id":"biz","changes":[
              {"field":"messages","value":{"messages":[
                {"id":"wamid.1","from":"111","timestamp":"1","type":"text","text":{"body":"one"}}]}},
              {"field":"messages","value":{"statuses":[{"id":"wamid.0","status":"sent"}]}}]},
            {"id":"biz","changes":[
              {"field":"messages","value":{"messages":[
                {"id":"wamid.2","from":"222","timestamp":"1","type":"text","text":{"body":"two"}}]}}]}]}"#;
        let messages = parse_payload(body).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].chat_id, "111");
        assert_eq!(messages[1].chat_id, "222");
        assert_eq!(messages[1].sender.display_name, None);
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            parse_payload(b"<html>"),
            Err(HandoffError::MalformedPayload(_))
        ));
    }

    #[test]
    fn valid_signature_authenticates() {
        let body = br#"{"object":"whatsapp_business_account","entry":[]}"#.to_vec();
        let signature = sign(b"app-secret", &body).unwrap();
        let request = WebhookRequest::new(body).with_header("X-Hub-Signature-256", &signature);
        assert!(authenticate(&request, Some("app-secret")).is_ok());
    }

    #[test]
    fn tampered_body_fails_signature() {
        let signature = sign(b"app-secret", b"original").unwrap();
        let request =
            WebhookRequest::new(b"tampered".to_vec()).with_header("X-Hub-Signature-256", &signature);
        assert!(matches!(
            authenticate(&request, Some("app-secret")),
            Err(HandoffError::Authentication(_))
        ));
    }

    #[test]
    fn malformed_signature_header_is_rejected() {
        let request = WebhookRequest::new(vec![]).with_header("X-Hub-Signature-256", "md5=abc");
        assert!(authenticate(&request, Some("k")).is_err());
        let request = WebhookRequest::new(vec![]).with_header("X-Hub-Signature-256", "sha256=zz");
        assert!(authenticate(&request, Some("k")).is_err());
    }

    #[test]
    fn missing_signature_is_rejected_only_when_secret_configured() {
        let request = WebhookRequest::new(vec![]);
        assert!(authenticate(&request, Some("k")).is_err());
        assert!(authenticate(&request, None).is_ok());
    }

    #[test]
    fn generic_secret_header_is_accepted() {
        let request = WebhookRequest::new(vec![]).with_header("X-Webhook-Secret-Token", "k");
        assert!(authenticate(&request, Some("k")).is_ok());
    }

    #[test]
    fn subscription_handshake_echoes_challenge() {
        let query: HashMap<String, String> = [
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "vt"),
            ("hub.challenge", "12345"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(verify_subscription(&query, "vt").as_deref(), Some("12345"));
        assert_eq!(verify_subscription(&query, "other"), None);
    }
}
