// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by adapters, storage, and the routing engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::traits::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Enrichment,
    Storage,
    Notifier,
    Observability,
}

/// Current time formatted the way every persisted timestamp is written.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

// --- Tenants ---

/// Chat platforms the engine can receive webhooks from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Telegram,
    Whatsapp,
}

/// A tenant's credential for one chat platform.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCredential {
    pub tenant_id: String,
    pub channel: ChannelKind,
    /// Bot token (Telegram) or access token (WhatsApp Cloud API).
    pub token: String,
    /// Shared secret used to authenticate inbound webhooks. `None` disables the check.
    pub webhook_secret: Option<String>,
    /// Platform account identifier (the WhatsApp phone-number id).
    pub account_id: Option<String>,
}

impl std::fmt::Debug for ChannelCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCredential")
            .field("tenant_id", &self.tenant_id)
            .field("channel", &self.channel)
            .field("token", &"[redacted]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// An independent business customer of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    /// Where support tickets are e-mailed. `None` means tickets cannot be filed.
    pub support_email: Option<String>,
    /// Weekly schedule. `None` means the tenant never closes.
    pub business_hours: Option<BusinessHours>,
    /// Free-form knowledge base text used for automatic answers.
    pub knowledge_base: Option<String>,
}

/// Weekly business-hours schedule in the tenant's timezone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    /// IANA timezone name, e.g. `Europe/Berlin`.
    pub timezone: String,
    #[serde(default)]
    pub monday: Option<DaySchedule>,
    #[serde(default)]
    pub tuesday: Option<DaySchedule>,
    #[serde(default)]
    pub wednesday: Option<DaySchedule>,
    #[serde(default)]
    pub thursday: Option<DaySchedule>,
    #[serde(default)]
    pub friday: Option<DaySchedule>,
    #[serde(default)]
    pub saturday: Option<DaySchedule>,
    #[serde(default)]
    pub sunday: Option<DaySchedule>,
}

impl BusinessHours {
    /// Returns the schedule for a weekday, if one is configured.
    pub fn day(&self, weekday: chrono::Weekday) -> Option<&DaySchedule> {
        use chrono::Weekday;
        match weekday {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }
}

/// Opening hours for a single weekday, as `HH:MM` local times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

/// Role of a tenant user. Only [`AgentRole::Agent`] receives conversations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Admin,
    Agent,
}

/// A human operator belonging to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: AgentRole,
    pub active: bool,
}

/// Number of open conversations currently assigned to an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLoad {
    pub agent_id: String,
    pub open_conversations: u32,
}

// --- Contacts and conversations ---

/// Well-known keys inside [`Contact::metadata`].
pub mod metadata_keys {
    pub const LAST_INTENT: &str = "last_intent";
    pub const AI_SUMMARY: &str = "ai_summary";
    pub const AI_ERROR: &str = "ai_error";
    pub const SENTIMENT: &str = "sentiment";
    pub const EXTRACTED: &str = "extracted";
    pub const COACHING: &str = "coaching";
}

/// A customer identified by an external chat id within one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub tenant_id: String,
    pub channel: ChannelKind,
    /// Platform-specific opaque chat identifier.
    pub external_id: String,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields used to find or create a [`Contact`].
#[derive(Debug, Clone)]
pub struct NewContact {
    pub tenant_id: String,
    pub channel: ChannelKind,
    pub external_id: String,
    pub display_name: Option<String>,
    pub username: Option<String>,
}

/// Lifecycle status of a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Pending,
    Closed,
}

/// Who owns replies in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationMode {
    /// No agent assigned; the engine answers automatically.
    Bot,
    /// A human agent owns the conversation; automation is suppressed.
    Agent { agent_id: String },
}

/// A thread between a contact and the tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub contact_id: String,
    pub channel: ChannelKind,
    pub assignee_agent_id: Option<String>,
    pub status: ConversationStatus,
    pub unread_count: i64,
    pub last_message_at: Option<String>,
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    /// Derives the handoff mode from the assignment.
    pub fn mode(&self) -> ConversationMode {
        match &self.assignee_agent_id {
            Some(agent_id) => ConversationMode::Agent {
                agent_id: agent_id.clone(),
            },
            None => ConversationMode::Bot,
        }
    }
}

// --- Messages ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Customer,
    Agent,
    Bot,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    Document,
    Audio,
    Voice,
    Video,
    Callback,
    Menu,
}

/// A persisted message. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub sender_role: SenderRole,
    pub content_type: ContentType,
    pub body: String,
    pub media_ref: Option<String>,
    pub platform_message_id: Option<String>,
    /// Idempotency key for inbound messages; `None` for outbound rows.
    pub dedupe_key: Option<String>,
    pub created_at: String,
}

impl Message {
    /// Builds the inbound row for a normalized platform message.
    pub fn inbound(
        tenant_id: &str,
        conversation_id: &str,
        channel: ChannelKind,
        msg: &NormalizedMessage,
    ) -> Self {
        Self {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation_id.to_string(),
            direction: Direction::Inbound,
            sender_role: SenderRole::Customer,
            content_type: msg.content_type(),
            body: msg.body.clone(),
            media_ref: msg.media.as_ref().map(|m| m.file_id.clone()),
            platform_message_id: Some(msg.platform_message_id.clone()),
            dedupe_key: Some(msg.dedupe_key(channel)),
            created_at: now_timestamp(),
        }
    }

    /// Builds an outbound row for an automatic reply.
    pub fn outbound_bot(
        tenant_id: &str,
        conversation_id: &str,
        content_type: ContentType,
        body: &str,
    ) -> Self {
        Self {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation_id.to_string(),
            direction: Direction::Outbound,
            sender_role: SenderRole::Bot,
            content_type,
            body: body.to_string(),
            media_ref: None,
            platform_message_id: None,
            dedupe_key: None,
            created_at: now_timestamp(),
        }
    }
}

/// An inbound message stored together with the thread it landed in.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedInbound {
    pub conversation: Conversation,
    /// `true` when storing this message also opened the conversation.
    pub opened: bool,
    pub message: Message,
}

/// Fresh random row id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// --- Normalized inbound messages ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
    Audio,
    Voice,
    Video,
}

/// Reference to platform-hosted media attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    /// Platform file id (Telegram `file_id`, WhatsApp media id).
    pub file_id: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

/// Sender details as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderProfile {
    pub display_name: Option<String>,
    pub username: Option<String>,
}

/// What kind of inbound event a normalized message represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// Plain text typed by the customer.
    Text,
    /// A media upload, optionally with a caption in the body.
    Media(MediaKind),
    /// A button press. `payload` is the opaque value attached to the button.
    Callback {
        callback_id: Option<String>,
        payload: String,
    },
}

/// A platform-agnostic inbound message produced by a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    /// Platform message id, used for idempotency.
    pub platform_message_id: String,
    /// Platform chat id the reply must be addressed to.
    pub chat_id: String,
    pub sender: SenderProfile,
    /// Human-readable text (message text, caption, or button label).
    pub body: String,
    pub kind: InboundKind,
    pub media: Option<MediaRef>,
    pub sent_at: String,
}

impl NormalizedMessage {
    pub fn is_callback(&self) -> bool {
        matches!(self.kind, InboundKind::Callback { .. })
    }

    pub fn callback_payload(&self) -> Option<&str> {
        match &self.kind {
            InboundKind::Callback { payload, .. } => Some(payload.as_str()),
            _ => None,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match &self.kind {
            InboundKind::Text => ContentType::Text,
            InboundKind::Callback { .. } => ContentType::Callback,
            InboundKind::Media(kind) => match kind {
                MediaKind::Image => ContentType::Image,
                MediaKind::Document => ContentType::Document,
                MediaKind::Audio => ContentType::Audio,
                MediaKind::Voice => ContentType::Voice,
                MediaKind::Video => ContentType::Video,
            },
        }
    }

    /// Idempotency key, unique per tenant: `{channel}:{chat_id}:{platform_message_id}`.
    pub fn dedupe_key(&self, channel: ChannelKind) -> String {
        format!("{channel}:{}:{}", self.chat_id, self.platform_message_id)
    }
}

// --- Outbound ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Platform message id to reply to.
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuButton {
    pub label: String,
    pub payload: String,
}

/// A text with a set of reply buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSpec {
    pub text: String,
    pub buttons: Vec<MenuButton>,
}

/// Media sent by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSpec {
    pub kind: MediaKind,
    pub url: String,
    pub caption: Option<String>,
}

// --- Enrichment ---

/// Classified customer intent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SupportRequest,
    HandoverRequest,
    KnowledgeQuery,
    General,
    /// Anything the provider returned that is not a known label, or no classification at all.
    #[serde(other)]
    Unclassified,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
    #[serde(other)]
    Unknown,
}

/// Contact details the provider extracted from the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.company.is_none()
    }
}

/// Advice for the human agent who eventually picks up the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coaching {
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub next_step: Option<String>,
    #[serde(default)]
    pub objection_handling: Option<String>,
    #[serde(default)]
    pub suggested_replies: Vec<String>,
}

/// Structured output of one enrichment call. Transient, never persisted as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub intent: Intent,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub extracted: ExtractedFields,
    #[serde(default)]
    pub coaching: Coaching,
}

// --- Webhooks ---

/// Raw inbound webhook delivery, independent of the HTTP framework.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    /// Header names are stored lower-cased.
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            headers: HashMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_message(id: &str) -> NormalizedMessage {
        NormalizedMessage {
            platform_message_id: id.into(),
            chat_id: "4242".into(),
            sender: SenderProfile::default(),
            body: "hello".into(),
            kind: InboundKind::Text,
            media: None,
            sent_at: now_timestamp(),
        }
    }

    #[test]
    fn unknown_intent_label_deserializes_as_unclassified() {
        let intent: Intent = serde_json::from_str("\"buy_pizza\"").unwrap();
        assert_eq!(intent, Intent::Unclassified);
        let intent: Intent = serde_json::from_str("\"handover_request\"").unwrap();
        assert_eq!(intent, Intent::HandoverRequest);
    }

    #[test]
    fn intent_displays_as_snake_case() {
        assert_eq!(Intent::SupportRequest.to_string(), "support_request");
        assert_eq!(ChannelKind::Whatsapp.to_string(), "whatsapp");
    }

    #[test]
    fn enrichment_result_requires_intent_only() {
        let result: EnrichmentResult =
            serde_json::from_str(r#"{"intent":"knowledge_query"}"#).unwrap();
        assert_eq!(result.intent, Intent::KnowledgeQuery);
        assert!(result.tags.is_empty());
        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert!(result.extracted.is_empty());

        assert!(serde_json::from_str::<EnrichmentResult>(r#"{"tags":[]}"#).is_err());
    }

    #[test]
    fn conversation_mode_follows_assignment() {
        let mut conv = Conversation {
            id: "c1".into(),
            tenant_id: "t1".into(),
            contact_id: "k1".into(),
            channel: ChannelKind::Telegram,
            assignee_agent_id: None,
            status: ConversationStatus::Open,
            unread_count: 0,
            last_message_at: None,
            summary: None,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        assert_eq!(conv.mode(), ConversationMode::Bot);
        conv.assignee_agent_id = Some("a1".into());
        assert_eq!(
            conv.mode(),
            ConversationMode::Agent {
                agent_id: "a1".into()
            }
        );
    }

    #[test]
    fn dedupe_key_is_scoped_by_channel_and_chat() {
        let msg = text_message("77");
        assert_eq!(msg.dedupe_key(ChannelKind::Telegram), "telegram:4242:77");
        let row = Message::inbound("t1", "c1", ChannelKind::Telegram, &msg);
        assert_eq!(row.dedupe_key.as_deref(), Some("telegram:4242:77"));
        assert_eq!(row.direction, Direction::Inbound);
        assert_eq!(row.sender_role, SenderRole::Customer);
    }

    #[test]
    fn callback_exposes_payload_separately_from_body() {
        let mut msg = text_message("1");
        msg.body = "Talk to a human".into();
        msg.kind = InboundKind::Callback {
            callback_id: Some("cb-1".into()),
            payload: "menu:agent".into(),
        };
        assert!(msg.is_callback());
        assert_eq!(msg.callback_payload(), Some("menu:agent"));
        assert_eq!(msg.content_type(), ContentType::Callback);
    }

    #[test]
    fn webhook_headers_are_case_insensitive() {
        let req = WebhookRequest::new(vec![]).with_header("X-Telegram-Bot-Api-Secret-Token", "s3");
        assert_eq!(req.header("x-telegram-bot-api-secret-token"), Some("s3"));
        assert_eq!(req.header("X-TELEGRAM-BOT-API-SECRET-TOKEN"), Some("s3"));
    }

    #[test]
    fn credential_debug_redacts_secrets() {
        let cred = ChannelCredential {
            tenant_id: "t1".into(),
            channel: ChannelKind::Telegram,
            token: "123:secret-token".into(),
            webhook_secret: Some("hook-secret".into()),
            account_id: None,
        };
        let debug = format!("{cred:?}");
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("hook-secret"));
    }

    #[test]
    fn business_hours_day_lookup() {
        let hours = BusinessHours {
            timezone: "UTC".into(),
            monday: Some(DaySchedule {
                enabled: true,
                start: "09:00".into(),
                end: "18:00".into(),
            }),
            ..BusinessHours::default()
        };
        assert!(hours.day(chrono::Weekday::Mon).is_some());
        assert!(hours.day(chrono::Weekday::Sun).is_none());
    }
}
