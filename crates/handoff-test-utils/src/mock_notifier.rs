// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket notifier that records instead of sending.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use handoff_core::HandoffError;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::traits::notifier::TicketNotifier;
use handoff_core::types::{AdapterType, Contact, HealthStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiledTicket {
    pub to: String,
    pub contact_id: String,
    pub issue_text: String,
    pub conversation_id: String,
}

pub struct MockNotifier {
    tickets: Mutex<Vec<FiledTicket>>,
    deliver: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            tickets: Mutex::new(Vec::new()),
            deliver: AtomicBool::new(true),
        }
    }

    /// When `false`, every ticket is recorded but reported as undelivered.
    pub fn set_delivering(&self, deliver: bool) {
        self.deliver.store(deliver, Ordering::SeqCst);
    }

    pub async fn tickets(&self) -> Vec<FiledTicket> {
        self.tickets.lock().await.clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockNotifier {
    fn name(&self) -> &str {
        "mock-notifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl TicketNotifier for MockNotifier {
    async fn send_support_ticket(
        &self,
        to: &str,
        contact: &Contact,
        issue_text: &str,
        conversation_id: &str,
    ) -> bool {
        self.tickets.lock().await.push(FiledTicket {
            to: to.to_string(),
            contact_id: contact.id.clone(),
            issue_text: issue_text.to_string(),
            conversation_id: conversation_id.to_string(),
        });
        self.deliver.load(Ordering::SeqCst)
    }
}
