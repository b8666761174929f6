// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Handoff routing engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use handoff_core::types::{MenuButton, MenuSpec};
use serde::{Deserialize, Serialize};

/// Top-level Handoff configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP listener for webhooks, health, and metrics.
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Telegram Bot API settings shared by all tenants.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// WhatsApp Cloud API settings shared by all tenants.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Language-model providers used for intent classification.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// SMTP relay for support tickets.
    #[serde(default)]
    pub email: EmailConfig,

    /// Routing timeouts and customer-facing reply texts.
    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, used in logs and ticket e-mails.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "handoff".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted webhook body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("handoff").join("handoff.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("handoff.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Telegram Bot API configuration.
///
/// Bot tokens are per tenant and live in storage, not here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api_base_url")]
    pub api_base_url: String,

    /// Timeout for a single Bot API request.
    #[serde(default = "default_channel_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_telegram_api_base_url(),
            timeout_secs: default_channel_timeout_secs(),
        }
    }
}

fn default_telegram_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_channel_timeout_secs() -> u64 {
    10
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    #[serde(default = "default_whatsapp_api_base_url")]
    pub api_base_url: String,

    /// Graph API version segment, e.g. `v19.0`.
    #[serde(default = "default_whatsapp_api_version")]
    pub api_version: String,

    #[serde(default = "default_channel_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_whatsapp_api_base_url(),
            api_version: default_whatsapp_api_version(),
            timeout_secs: default_channel_timeout_secs(),
        }
    }
}

fn default_whatsapp_api_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_whatsapp_api_version() -> String {
    "v19.0".to_string()
}

/// Enrichment provider configuration.
///
/// Gemini is preferred whenever its key is well-formed; OpenAI is used
/// otherwise. With neither key set, enrichment is disabled and every
/// message takes the fallback path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Upper bound for one enrichment call, retries included.
    #[serde(default = "default_enrichment_timeout_secs")]
    pub timeout_secs: u64,

    /// Knowledge base text beyond this many characters is not sent to the provider.
    #[serde(default = "default_knowledge_max_chars")]
    pub knowledge_max_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            gemini_base_url: default_gemini_base_url(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            timeout_secs: default_enrichment_timeout_secs(),
            knowledge_max_chars: default_knowledge_max_chars(),
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_enrichment_timeout_secs() -> u64 {
    30
}

fn default_knowledge_max_chars() -> usize {
    12_000
}

/// SMTP relay configuration for support tickets.
///
/// Leaving `smtp_host` unset logs tickets instead of mailing them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender address for ticket e-mails. Required when `smtp_host` is set.
    #[serde(default)]
    pub from_address: Option<String>,

    /// Use STARTTLS. Disable only for local relays.
    #[serde(default = "default_starttls")]
    pub starttls: bool,

    #[serde(default = "default_email_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: None,
            starttls: default_starttls(),
            timeout_secs: default_email_timeout_secs(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

fn default_email_timeout_secs() -> u64 {
    15
}

/// Routing engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Timeout for each outbound chat-platform call.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Timeout for filing one support ticket.
    #[serde(default = "default_ticket_timeout_secs")]
    pub ticket_timeout_secs: u64,

    /// Customer-facing reply texts.
    #[serde(default)]
    pub replies: RepliesConfig,

    /// Menu sent as the first reply of every new conversation.
    #[serde(default)]
    pub welcome_menu: WelcomeMenuConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout_secs(),
            ticket_timeout_secs: default_ticket_timeout_secs(),
            replies: RepliesConfig::default(),
            welcome_menu: WelcomeMenuConfig::default(),
        }
    }
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_ticket_timeout_secs() -> u64 {
    20
}

/// Automatic reply texts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepliesConfig {
    #[serde(default = "default_ticket_confirmation")]
    pub ticket_confirmation: String,

    /// Sent when a ticket cannot be filed (no support address, or delivery failed).
    #[serde(default = "default_ticket_unavailable")]
    pub ticket_unavailable: String,

    #[serde(default = "default_out_of_hours")]
    pub out_of_hours: String,

    #[serde(default = "default_agent_connected")]
    pub agent_connected: String,

    #[serde(default = "default_no_agent_available")]
    pub no_agent_available: String,

    /// Used when enrichment produced no suggested reply.
    #[serde(default = "default_generic_fallback")]
    pub generic_fallback: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            ticket_confirmation: default_ticket_confirmation(),
            ticket_unavailable: default_ticket_unavailable(),
            out_of_hours: default_out_of_hours(),
            agent_connected: default_agent_connected(),
            no_agent_available: default_no_agent_available(),
            generic_fallback: default_generic_fallback(),
        }
    }
}

fn default_ticket_confirmation() -> String {
    "Thanks! We've opened a support ticket and our team will get back to you shortly.".to_string()
}

fn default_ticket_unavailable() -> String {
    "Sorry, we couldn't open a ticket right now. A member of our team will follow up here."
        .to_string()
}

fn default_out_of_hours() -> String {
    "Our team is currently offline. Please leave your name, e-mail and a short description \
     and we'll get back to you as soon as we're open."
        .to_string()
}

fn default_agent_connected() -> String {
    "You're now connected with one of our specialists. They'll reply here shortly.".to_string()
}

fn default_no_agent_available() -> String {
    "Sorry, all of our specialists are busy right now. Please try again in a little while."
        .to_string()
}

fn default_generic_fallback() -> String {
    "Thanks for your message! How can we help you today?".to_string()
}

/// Welcome menu configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WelcomeMenuConfig {
    #[serde(default = "default_welcome_text")]
    pub text: String,

    /// Between one and three buttons.
    #[serde(default = "default_welcome_buttons")]
    pub buttons: Vec<MenuButtonConfig>,
}

impl Default for WelcomeMenuConfig {
    fn default() -> Self {
        Self {
            text: default_welcome_text(),
            buttons: default_welcome_buttons(),
        }
    }
}

impl WelcomeMenuConfig {
    pub fn to_menu_spec(&self) -> MenuSpec {
        MenuSpec {
            text: self.text.clone(),
            buttons: self
                .buttons
                .iter()
                .map(|b| MenuButton {
                    label: b.label.clone(),
                    payload: b.payload.clone(),
                })
                .collect(),
        }
    }
}

/// A single welcome-menu button.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MenuButtonConfig {
    pub label: String,
    pub payload: String,
}

fn default_welcome_text() -> String {
    "Hi! 👋 How can we help you today?".to_string()
}

fn default_welcome_buttons() -> Vec<MenuButtonConfig> {
    [
        ("Get support", "menu:support"),
        ("Talk to an agent", "menu:agent"),
        ("FAQ", "menu:faq"),
    ]
    .into_iter()
    .map(|(label, payload)| MenuButtonConfig {
        label: label.to_string(),
        payload: payload.to_string(),
    })
    .collect()
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Expose `GET /metrics` in Prometheus text format.
    #[serde(default)]
    pub enabled: bool,
}
