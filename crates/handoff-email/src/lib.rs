// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support-ticket delivery over SMTP.
//!
//! [`SmtpTicketNotifier`] sends a plain-text ticket to the tenant's support
//! address. [`LogOnlyNotifier`] stands in when no relay is configured: it
//! records the ticket in the log and reports it as undelivered.

use std::time::Duration;

use async_trait::async_trait;
use handoff_config::model::EmailConfig;
use handoff_core::error::HandoffError;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::traits::notifier::TicketNotifier;
use handoff_core::types::{AdapterType, Contact, HealthStatus};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

/// Builds the ticket subject line.
pub fn ticket_subject(contact: &Contact) -> String {
    let who = contact
        .display_name
        .as_deref()
        .or(contact.username.as_deref())
        .unwrap_or(&contact.external_id);
    format!("[Support] New ticket from {who}")
}

/// Builds the plain-text ticket body.
pub fn ticket_body(contact: &Contact, issue_text: &str, conversation_id: &str) -> String {
    let mut body = String::new();
    body.push_str("A customer asked for support.\n\n");
    body.push_str(&format!(
        "Name: {}\n",
        contact.display_name.as_deref().unwrap_or("(unknown)")
    ));
    if let Some(username) = contact.username.as_deref() {
        body.push_str(&format!("Username: @{username}\n"));
    }
    body.push_str(&format!("Channel: {}\n", contact.channel));
    body.push_str(&format!("Chat id: {}\n", contact.external_id));
    body.push_str(&format!("Conversation: {conversation_id}\n"));
    if !contact.tags.is_empty() {
        body.push_str(&format!("Tags: {}\n", contact.tags.join(", ")));
    }
    body.push_str(&format!(
        "Received: {}\n\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));
    body.push_str("Message:\n");
    body.push_str(issue_text);
    body.push('\n');
    body
}

/// SMTP-backed ticket notifier.
pub struct SmtpTicketNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTicketNotifier {
    /// Builds the notifier from `[email]`, or `None` when no relay is configured.
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>, HandoffError> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };
        let from_address = config.from_address.as_deref().ok_or_else(|| {
            HandoffError::Config("email.from_address is required when email.smtp_host is set".into())
        })?;
        let from: Mailbox = from_address
            .parse()
            .map_err(|e| HandoffError::Config(format!("invalid email.from_address: {e}")))?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| HandoffError::Config(format!("invalid SMTP relay {host}: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        if let (Some(user), Some(pass)) = (config.username.as_ref(), config.password.as_ref()) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }

    fn build_message(
        &self,
        to: &str,
        contact: &Contact,
        issue_text: &str,
        conversation_id: &str,
    ) -> Result<Message, HandoffError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| HandoffError::Config(format!("invalid support address {to}: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(ticket_subject(contact))
            .header(ContentType::TEXT_PLAIN)
            .body(ticket_body(contact, issue_text, conversation_id))
            .map_err(|e| HandoffError::Internal(format!("failed to build ticket e-mail: {e}")))
    }
}

#[async_trait]
impl PluginAdapter for SmtpTicketNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Degraded("SMTP relay refused NOOP".into())),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("SMTP relay unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl TicketNotifier for SmtpTicketNotifier {
    async fn send_support_ticket(
        &self,
        to: &str,
        contact: &Contact,
        issue_text: &str,
        conversation_id: &str,
    ) -> bool {
        let message = match self.build_message(to, contact, issue_text, conversation_id) {
            Ok(message) => message,
            Err(e) => {
                warn!(tenant_id = %contact.tenant_id, error = %e, "support ticket not sent");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                info!(
                    tenant_id = %contact.tenant_id,
                    conversation_id,
                    "support ticket sent"
                );
                true
            }
            Err(e) => {
                metrics::counter!("handoff_ticket_send_errors_total").increment(1);
                warn!(
                    tenant_id = %contact.tenant_id,
                    conversation_id,
                    error = %e,
                    "support ticket delivery failed"
                );
                false
            }
        }
    }
}

/// Notifier used when `[email]` has no relay. Tickets are logged, not delivered.
#[derive(Debug, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl PluginAdapter for LogOnlyNotifier {
    fn name(&self) -> &str {
        "log-only"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Degraded("no SMTP relay configured".into()))
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl TicketNotifier for LogOnlyNotifier {
    async fn send_support_ticket(
        &self,
        to: &str,
        contact: &Contact,
        issue_text: &str,
        conversation_id: &str,
    ) -> bool {
        warn!(
            tenant_id = %contact.tenant_id,
            conversation_id,
            to,
            subject = %ticket_subject(contact),
            issue = issue_text,
            "no SMTP relay configured; support ticket logged only"
        );
        false
    }
}
