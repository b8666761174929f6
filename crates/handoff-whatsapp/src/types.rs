// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cloud API webhook payloads and outbound message bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: Option<ChangeValue>,
}

/// One change notification. Delivery receipts arrive with `statuses`
/// and no `messages`.
#[derive(Debug, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub contacts: Vec<WaContact>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub id: String,
    pub from: String,
    /// Unix seconds as a decimal string.
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub interactive: Option<InteractiveReply>,
    /// Quick-reply button on a template message.
    #[serde(default)]
    pub button: Option<TemplateButtonReply>,
    #[serde(default)]
    pub image: Option<MediaObject>,
    #[serde(default)]
    pub document: Option<MediaObject>,
    #[serde(default)]
    pub audio: Option<MediaObject>,
    #[serde(default)]
    pub video: Option<MediaObject>,
    #[serde(default)]
    pub context: Option<MessageContext>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractiveReply {
    #[serde(default)]
    pub button_reply: Option<ReplyChoice>,
    #[serde(default)]
    pub list_reply: Option<ReplyChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyChoice {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplateButtonReply {
    pub payload: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaObject {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Set on audio messages recorded as voice notes.
    #[serde(default)]
    pub voice: bool,
}

#[derive(Debug, Deserialize)]
pub struct MessageContext {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WaContact {
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

// --- Outbound ---

/// Envelope for `POST /{phone_number_id}/messages`.
#[derive(Debug, Serialize)]
pub struct OutboundMessage<'a> {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<OutboundContext>,
    #[serde(flatten)]
    pub content: OutboundContent,
}

impl<'a> OutboundMessage<'a> {
    pub fn new(to: &'a str, content: OutboundContent) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            context: None,
            content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutboundContext {
    pub message_id: String,
}

/// Message body keyed by its `type`, e.g. `{"type":"text","text":{...}}`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundContent {
    Text { text: OutboundText },
    Interactive { interactive: Interactive },
    Image { image: MediaLink },
    Document { document: MediaLink },
    Audio { audio: MediaLink },
    Video { video: MediaLink },
}

#[derive(Debug, Serialize)]
pub struct OutboundText {
    pub body: String,
    pub preview_url: bool,
}

#[derive(Debug, Serialize)]
pub struct Interactive {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub body: InteractiveBody,
    pub action: InteractiveAction,
}

#[derive(Debug, Serialize)]
pub struct InteractiveBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct InteractiveAction {
    pub buttons: Vec<ReplyButton>,
}

#[derive(Debug, Serialize)]
pub struct ReplyButton {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub reply: ReplyButtonBody,
}

#[derive(Debug, Serialize)]
pub struct ReplyButtonBody {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct MediaLink {
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentId>,
}

#[derive(Debug, Deserialize)]
pub struct SentId {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_envelope_serializes_with_type_tag() {
        let msg = OutboundMessage::new(
            "15551234567",
            OutboundContent::Text {
                text: OutboundText {
                    body: "hi".into(),
                    preview_url: false,
                },
            },
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "15551234567",
                "type": "text",
                "text": {"body": "hi", "preview_url": false}
            })
        );
    }

    #[test]
    fn status_only_change_has_no_messages() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"object":"whatsapp_business_account","entry":[{"changes":[{"value":
                {"statuses":[{"id":"wamid.1","status":"delivered"}]}}]}]}"#,
        )
        .unwrap();
        let value = payload.entry[0].changes[0].value.as_ref().unwrap();
        assert!(value.messages.is_empty());
    }
}
