// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end test harness.
//!
//! Wires a real [`SqliteStorage`] in a temporary directory to a [`Router`]
//! with mock channel, enricher and notifier, and a [`FixedClock`].

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use handoff_config::model::StorageConfig;
use handoff_core::types::{
    Agent, AgentRole, ChannelCredential, ChannelKind, Contact, Conversation, Message, NewContact,
    Tenant, WebhookRequest,
};
use handoff_core::{HandoffError, StorageAdapter};
use handoff_routing::{FixedClock, Router, RoutingSettings, WebhookOutcome};
use handoff_storage::SqliteStorage;

use crate::mock_channel::{MockChannel, MockInbound, SECRET_HEADER};
use crate::mock_enricher::MockEnricher;
use crate::mock_notifier::MockNotifier;

pub const TENANT_ID: &str = "acme";
pub const WEBHOOK_SECRET: &str = "test-secret";
pub const SUPPORT_EMAIL: &str = "support@acme.example";

/// The tenant seeded by [`TestHarness::seed_default_tenant`].
pub fn default_tenant() -> Tenant {
    Tenant {
        id: TENANT_ID.to_string(),
        name: "Acme".to_string(),
        support_email: Some(SUPPORT_EMAIL.to_string()),
        business_hours: None,
        knowledge_base: Some("Acme sells anvils. Shipping takes 3 days.".to_string()),
    }
}

/// Monday 2026-01-05 10:00 UTC.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub struct TestHarnessBuilder {
    settings: RoutingSettings,
    now: DateTime<Utc>,
    kind: ChannelKind,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            settings: RoutingSettings::default(),
            now: monday_morning(),
            kind: ChannelKind::Telegram,
        }
    }

    pub fn with_settings(mut self, settings: RoutingSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_channel_kind(mut self, kind: ChannelKind) -> Self {
        self.kind = kind;
        self
    }

    pub async fn build(self) -> Result<TestHarness, HandoffError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| HandoffError::Storage { source: e.into() })?;
        let storage = SqliteStorage::new(StorageConfig {
            database_path: temp_dir
                .path()
                .join("handoff-test.db")
                .to_string_lossy()
                .into_owned(),
            wal_mode: true,
        });
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let channel = Arc::new(MockChannel::new(self.kind));
        let enricher = Arc::new(MockEnricher::new());
        let notifier = Arc::new(MockNotifier::new());
        let clock = Arc::new(FixedClock::new(self.now));

        let router = Router::new(
            storage.clone(),
            enricher.clone(),
            notifier.clone(),
            self.settings,
        )
        .with_channel(channel.clone())
        .with_clock(clock.clone());

        Ok(TestHarness {
            channel,
            enricher,
            notifier,
            clock,
            storage,
            router: Arc::new(router),
            kind: self.kind,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete routing environment with mock adapters and temp storage.
pub struct TestHarness {
    pub channel: Arc<MockChannel>,
    pub enricher: Arc<MockEnricher>,
    pub notifier: Arc<MockNotifier>,
    pub clock: Arc<FixedClock>,
    pub storage: Arc<SqliteStorage>,
    pub router: Arc<Router>,
    kind: ChannelKind,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Default harness with [`default_tenant`] already seeded.
    pub async fn new() -> Result<Self, HandoffError> {
        let harness = Self::builder().build().await?;
        harness.seed_default_tenant().await?;
        Ok(harness)
    }

    pub fn channel_kind(&self) -> ChannelKind {
        self.kind
    }

    pub async fn seed_default_tenant(&self) -> Result<(), HandoffError> {
        self.seed_tenant(&default_tenant(), Some(WEBHOOK_SECRET))
            .await
    }

    /// Stores `tenant` with a credential for the mock channel.
    pub async fn seed_tenant(
        &self,
        tenant: &Tenant,
        webhook_secret: Option<&str>,
    ) -> Result<(), HandoffError> {
        self.storage.upsert_tenant(tenant).await?;
        self.storage
            .upsert_channel_credential(&ChannelCredential {
                tenant_id: tenant.id.clone(),
                channel: self.kind,
                token: "mock-bot-token".to_string(),
                webhook_secret: webhook_secret.map(str::to_string),
                account_id: None,
            })
            .await
    }

    /// Replaces the default tenant's record, keeping its credential.
    pub async fn update_default_tenant(
        &self,
        edit: impl FnOnce(&mut Tenant),
    ) -> Result<(), HandoffError> {
        let mut tenant = default_tenant();
        edit(&mut tenant);
        self.storage.upsert_tenant(&tenant).await
    }

    /// Adds an active, non-admin agent to the default tenant.
    pub async fn add_agent(&self, agent_id: &str) -> Result<(), HandoffError> {
        self.storage
            .upsert_agent(&Agent {
                id: agent_id.to_string(),
                tenant_id: TENANT_ID.to_string(),
                name: agent_id.to_string(),
                email: None,
                role: AgentRole::Agent,
                active: true,
            })
            .await
    }

    /// Gives `agent_id` `count` open conversations with throwaway contacts.
    pub async fn preload_agent(&self, agent_id: &str, count: usize) -> Result<(), HandoffError> {
        for i in 0..count {
            let contact = self
                .storage
                .find_or_create_contact(&NewContact {
                    tenant_id: TENANT_ID.to_string(),
                    channel: self.kind,
                    external_id: format!("preload-{agent_id}-{i}"),
                    display_name: None,
                    username: None,
                })
                .await?;
            let (conversation, _) = self
                .storage
                .find_or_create_open_conversation(TENANT_ID, &contact.id, self.kind)
                .await?;
            self.storage
                .assign_conversation(&conversation.id, agent_id)
                .await?;
        }
        Ok(())
    }

    /// Builds a signed webhook request for `payload`.
    pub fn request(payload: &MockInbound) -> WebhookRequest {
        WebhookRequest::new(payload.to_bytes()).with_header(SECRET_HEADER, WEBHOOK_SECRET)
    }

    /// Delivers `payload` to the default tenant as a signed webhook.
    pub async fn deliver(&self, payload: &MockInbound) -> Result<WebhookOutcome, HandoffError> {
        let mut outcomes = self
            .router
            .handle_webhook(self.kind, TENANT_ID, &Self::request(payload))
            .await?;
        Ok(outcomes.pop().unwrap_or(WebhookOutcome::Dropped))
    }

    /// Delivers all of `payloads` in one signed webhook call.
    pub async fn deliver_batch(
        &self,
        payloads: &[MockInbound],
    ) -> Result<Vec<WebhookOutcome>, HandoffError> {
        let request = WebhookRequest::new(MockInbound::batch(payloads))
            .with_header(SECRET_HEADER, WEBHOOK_SECRET);
        self.router
            .handle_webhook(self.kind, TENANT_ID, &request)
            .await
    }

    /// Contact and open conversation for `chat_id` on the default tenant.
    ///
    /// Creates them if they do not exist yet, so call it after a delivery.
    pub async fn thread(&self, chat_id: &str) -> Result<(Contact, Conversation), HandoffError> {
        let contact = self
            .storage
            .find_or_create_contact(&NewContact {
                tenant_id: TENANT_ID.to_string(),
                channel: self.kind,
                external_id: chat_id.to_string(),
                display_name: None,
                username: None,
            })
            .await?;
        let (conversation, _) = self
            .storage
            .find_or_create_open_conversation(TENANT_ID, &contact.id, self.kind)
            .await?;
        Ok((contact, conversation))
    }

    pub async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, HandoffError> {
        let (_, conversation) = self.thread(chat_id).await?;
        self.storage.list_messages(&conversation.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::types::Direction;

    #[tokio::test]
    async fn harness_routes_a_first_message() {
        let harness = TestHarness::new().await.unwrap();
        let outcome = harness
            .deliver(&MockInbound::text("m1", "555", "hello"))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Processed(_)));

        let sent = harness.channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_menu());

        let messages = harness.messages("555").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].direction, Direction::Inbound);
        assert_eq!(messages[1].direction, Direction::Outbound);
    }

    #[tokio::test]
    async fn preloaded_agents_carry_open_conversations() {
        let harness = TestHarness::new().await.unwrap();
        harness.add_agent("a").await.unwrap();
        harness.preload_agent("a", 2).await.unwrap();

        let loads = harness.storage.list_agent_loads(TENANT_ID).await.unwrap();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].open_conversations, 2);
    }
}
