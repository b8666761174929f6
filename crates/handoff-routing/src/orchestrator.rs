// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-webhook routing pipeline.
//!
//! `resolve tenant -> authenticate -> parse -> store inbound in its thread
//! -> decide -> act -> record enrichment`, once per message in the payload.
//! Only tenant resolution, authentication and storage failures before
//! authentication are returned as errors; everything after a successful
//! parse is absorbed into a [`WebhookOutcome`] so the platform always gets
//! its acknowledgement.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use handoff_config::HandoffConfig;
use handoff_config::model::RepliesConfig;
use handoff_core::error::HandoffError;
use handoff_core::traits::channel::ChannelAdapter;
use handoff_core::traits::enrichment::Enricher;
use handoff_core::traits::notifier::TicketNotifier;
use handoff_core::traits::storage::StorageAdapter;
use handoff_core::types::{
    ChannelKind, ContentType, EnrichmentResult, InboundKind, Intent, MenuSpec, Message,
    NormalizedMessage, SendOptions, WebhookRequest, metadata_keys,
};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::balancer::AssignmentBalancer;
use crate::clock::{Clock, SystemClock};
use crate::handoff::{self, BotAction, TurnFacts};
use crate::hours::BusinessHoursGate;
use crate::identity::{ResolvedThread, ThreadResolver};
use crate::replies;
use crate::tenant::{ResolvedTenant, TenantResolver};

/// Timeouts and customer-facing texts used while routing.
#[derive(Debug, Clone)]
pub struct RoutingSettings {
    pub send_timeout: Duration,
    pub ticket_timeout: Duration,
    pub enrichment_timeout: Duration,
    pub replies: RepliesConfig,
    pub welcome_menu: MenuSpec,
}

impl RoutingSettings {
    pub fn from_config(config: &HandoffConfig) -> Self {
        Self {
            send_timeout: Duration::from_secs(config.routing.send_timeout_secs),
            ticket_timeout: Duration::from_secs(config.routing.ticket_timeout_secs),
            enrichment_timeout: Duration::from_secs(config.enrichment.timeout_secs),
            replies: config.routing.replies.clone(),
            welcome_menu: config.routing.welcome_menu.to_menu_spec(),
        }
    }
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self::from_config(&HandoffConfig::default())
    }
}

/// How an acknowledged webhook was handled. Never shown to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The message was stored and the bot took `action`.
    Processed(BotAction),
    /// The platform message id was already stored; nothing ran.
    Duplicate,
    /// The payload carried nothing actionable or could not be decoded.
    Dropped,
    /// Processing stopped on an internal error after the request was accepted.
    Failed,
}

impl WebhookOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed(_) => "processed",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Dropped => "dropped",
            WebhookOutcome::Failed => "failed",
        }
    }
}

enum Classification {
    /// A welcome-menu button fixed the intent.
    Menu(Intent),
    Enriched(EnrichmentResult),
    Failed(HandoffError),
    /// Nothing to classify (media without a caption).
    Skipped,
}

impl Classification {
    fn intent(&self) -> Intent {
        match self {
            Classification::Menu(intent) => *intent,
            Classification::Enriched(result) => result.intent,
            Classification::Failed(_) | Classification::Skipped => Intent::Unclassified,
        }
    }

    fn enrichment(&self) -> Option<&EnrichmentResult> {
        match self {
            Classification::Enriched(result) => Some(result),
            _ => None,
        }
    }
}

/// Everything one turn needs, borrowed for its duration.
struct Turn<'a> {
    channel: &'a dyn ChannelAdapter,
    resolved: &'a ResolvedTenant,
    thread: &'a ResolvedThread,
    message: &'a NormalizedMessage,
}

impl Turn<'_> {
    fn tenant_id(&self) -> &str {
        &self.resolved.tenant.id
    }

    fn conversation_id(&self) -> &str {
        &self.thread.conversation.id
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, HandoffError>>,
) -> Result<T, HandoffError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| HandoffError::Timeout { duration: limit })?
}

/// The routing engine. Cheap to share behind an `Arc`; holds no per-request state.
pub struct Router {
    storage: Arc<dyn StorageAdapter>,
    channels: HashMap<ChannelKind, Arc<dyn ChannelAdapter>>,
    enricher: Arc<dyn Enricher>,
    notifier: Arc<dyn TicketNotifier>,
    tenants: TenantResolver,
    threads: ThreadResolver,
    balancer: AssignmentBalancer,
    hours: BusinessHoursGate,
    settings: RoutingSettings,
}

impl Router {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        enricher: Arc<dyn Enricher>,
        notifier: Arc<dyn TicketNotifier>,
        settings: RoutingSettings,
    ) -> Self {
        Self {
            tenants: TenantResolver::new(storage.clone()),
            threads: ThreadResolver::new(storage.clone()),
            balancer: AssignmentBalancer::new(storage.clone()),
            hours: BusinessHoursGate::new(Arc::new(SystemClock)),
            storage,
            channels: HashMap::new(),
            enricher,
            notifier,
            settings,
        }
    }

    /// Registers the adapter for its [`ChannelKind`], replacing any previous one.
    pub fn with_channel(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.channels.insert(adapter.kind(), adapter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.hours = BusinessHoursGate::new(clock);
        self
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&Arc<dyn ChannelAdapter>> {
        self.channels.get(&kind)
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    fn require_channel(
        &self,
        kind: ChannelKind,
        tenant_id: &str,
    ) -> Result<&Arc<dyn ChannelAdapter>, HandoffError> {
        self.channel(kind)
            .ok_or_else(|| HandoffError::TenantNotConfigured {
                tenant_id: tenant_id.to_string(),
                channel: kind.to_string(),
            })
    }

    /// Handles one webhook delivery.
    ///
    /// `Err` means the request must be rejected (unknown tenant, bad
    /// secret) or could not even be looked up. Every `Ok` is acknowledged
    /// and carries one outcome per message in the payload, in payload
    /// order, or a single [`WebhookOutcome::Dropped`] when it carried none.
    pub async fn handle_webhook(
        &self,
        kind: ChannelKind,
        tenant_id: &str,
        request: &WebhookRequest,
    ) -> Result<Vec<WebhookOutcome>, HandoffError> {
        let channel = self.require_channel(kind, tenant_id)?;
        let resolved = self.tenants.resolve(tenant_id, kind).await?;
        self.tenants
            .authenticate(channel.as_ref(), &resolved, request)?;

        let outcomes = match channel.parse_incoming(&request.body) {
            Ok(messages) if messages.is_empty() => {
                debug!(tenant_id, channel = %kind, "payload not actionable, dropped");
                vec![WebhookOutcome::Dropped]
            }
            Ok(messages) => {
                if messages.len() > 1 {
                    debug!(tenant_id, channel = %kind, count = messages.len(), "batched delivery");
                }
                let mut outcomes = Vec::with_capacity(messages.len());
                for message in &messages {
                    outcomes.push(self.route_message(channel.as_ref(), &resolved, message).await);
                }
                outcomes
            }
            Err(e) => {
                warn!(tenant_id, channel = %kind, error = %e, "malformed payload dropped");
                vec![WebhookOutcome::Dropped]
            }
        };

        for outcome in &outcomes {
            metrics::counter!(
                "handoff_webhooks_total",
                "channel" => kind.to_string(),
                "outcome" => outcome.label()
            )
            .increment(1);
        }
        Ok(outcomes)
    }

    async fn route_message(
        &self,
        channel: &dyn ChannelAdapter,
        resolved: &ResolvedTenant,
        message: &NormalizedMessage,
    ) -> WebhookOutcome {
        match self.process(channel, resolved, message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    tenant_id = %resolved.tenant.id,
                    channel = %channel.kind(),
                    platform_message_id = %message.platform_message_id,
                    error = %e,
                    "routing failed after acknowledgement"
                );
                WebhookOutcome::Failed
            }
        }
    }

    /// Answers a subscription handshake for the tenant's channel.
    pub async fn verify_subscription(
        &self,
        kind: ChannelKind,
        tenant_id: &str,
        query: &HashMap<String, String>,
    ) -> Result<Option<String>, HandoffError> {
        let channel = self.require_channel(kind, tenant_id)?;
        let resolved = self.tenants.resolve(tenant_id, kind).await?;
        Ok(channel.verify_subscription(query, &resolved.credential))
    }

    async fn process(
        &self,
        channel: &dyn ChannelAdapter,
        resolved: &ResolvedTenant,
        message: &NormalizedMessage,
    ) -> Result<WebhookOutcome, HandoffError> {
        let tenant_id = resolved.tenant.id.as_str();
        let Some(thread) = self
            .threads
            .record(tenant_id, channel.kind(), message)
            .await?
        else {
            info!(
                tenant_id,
                platform_message_id = %message.platform_message_id,
                "duplicate delivery ignored"
            );
            return Ok(WebhookOutcome::Duplicate);
        };

        let turn = Turn {
            channel,
            resolved,
            thread: &thread,
            message,
        };
        self.acknowledge_callback(&turn).await;

        let facts = TurnFacts::new(&thread.conversation, thread.is_new);
        if facts.agent_mode {
            let action = handoff::decide(&facts);
            debug!(
                tenant_id,
                conversation_id = %thread.conversation.id,
                agent_id = thread.conversation.assignee_agent_id.as_deref().unwrap_or_default(),
                "conversation owned by an agent, no automatic reply"
            );
            record_action(action);
            return Ok(WebhookOutcome::Processed(action));
        }

        if handoff::sends_welcome_menu(&facts) {
            self.send_welcome_menu(&turn).await;
        }

        let classification = self.classify(&turn).await;
        let facts = facts.with_intent(classification.intent());
        let planned = handoff::decide(&facts);
        let action = self.execute(planned, &facts, &turn, &classification).await;

        self.record_classification(&turn, &classification).await;

        info!(
            tenant_id,
            conversation_id = %thread.conversation.id,
            message_id = %thread.inbound.id,
            intent = %facts.intent,
            action = %action,
            first = thread.is_new,
            "turn routed"
        );
        record_action(action);
        Ok(WebhookOutcome::Processed(action))
    }

    async fn classify(&self, turn: &Turn<'_>) -> Classification {
        if let Some(intent) = turn.message.callback_payload().and_then(replies::menu_intent) {
            return Classification::Menu(intent);
        }
        if turn.message.body.trim().is_empty() {
            return Classification::Skipped;
        }

        let call = self.enricher.enrich(
            &turn.message.body,
            &turn.thread.contact,
            turn.resolved.tenant.knowledge_base.as_deref(),
        );
        match bounded(self.settings.enrichment_timeout, call).await {
            Ok(result) => Classification::Enriched(result),
            Err(e) => {
                let e = match e {
                    HandoffError::Timeout { duration } => HandoffError::EnrichmentUnavailable {
                        message: format!("enrichment timed out after {duration:?}"),
                        source: None,
                    },
                    other => other,
                };
                warn!(
                    tenant_id = %turn.tenant_id(),
                    conversation_id = %turn.conversation_id(),
                    error = %e,
                    "enrichment failed, continuing unclassified"
                );
                Classification::Failed(e)
            }
        }
    }

    /// Runs the planned action and returns the action actually taken.
    async fn execute(
        &self,
        planned: BotAction,
        facts: &TurnFacts,
        turn: &Turn<'_>,
        classification: &Classification,
    ) -> BotAction {
        match planned {
            BotAction::DeferToAgent | BotAction::SuppressReply => planned,
            BotAction::GenericReply => {
                self.send_generic_reply(turn, classification).await;
                planned
            }
            BotAction::FileTicket => {
                self.file_ticket(turn).await;
                planned
            }
            BotAction::RequestHandover => {
                self.request_handover(turn).await;
                planned
            }
            BotAction::AnswerFromKnowledge => {
                if self.answer_from_knowledge(turn).await {
                    return planned;
                }
                let fallback = handoff::degraded_reply(facts);
                if fallback == BotAction::GenericReply {
                    self.send_generic_reply(turn, classification).await;
                }
                fallback
            }
        }
    }

    async fn send_generic_reply(&self, turn: &Turn<'_>, classification: &Classification) {
        let text = replies::generic_reply(
            classification.enrichment(),
            &self.settings.replies.generic_fallback,
        );
        self.reply(turn, text).await;
    }

    async fn file_ticket(&self, turn: &Turn<'_>) {
        let replies = &self.settings.replies;
        let Some(to) = turn
            .resolved
            .tenant
            .support_email
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        else {
            info!(
                tenant_id = %turn.tenant_id(),
                conversation_id = %turn.conversation_id(),
                "no support address configured, ticket not filed"
            );
            self.reply(turn, &replies.ticket_unavailable).await;
            return;
        };

        let send = self.notifier.send_support_ticket(
            to,
            &turn.thread.contact,
            &turn.message.body,
            turn.conversation_id(),
        );
        let filed = match tokio::time::timeout(self.settings.ticket_timeout, send).await {
            Ok(filed) => filed,
            Err(_) => {
                warn!(
                    tenant_id = %turn.tenant_id(),
                    conversation_id = %turn.conversation_id(),
                    timeout = ?self.settings.ticket_timeout,
                    "support ticket timed out"
                );
                false
            }
        };

        let text = if filed {
            &replies.ticket_confirmation
        } else {
            &replies.ticket_unavailable
        };
        self.reply(turn, text).await;
    }

    async fn request_handover(&self, turn: &Turn<'_>) {
        let replies = &self.settings.replies;
        let tenant_id = turn.tenant_id();

        if !self.hours.is_open_now(&turn.resolved.tenant) {
            info!(tenant_id, conversation_id = %turn.conversation_id(), "handover requested outside business hours");
            self.reply(turn, &replies.out_of_hours).await;
            return;
        }

        let agent_id = match self.balancer.pick_agent(tenant_id).await {
            Ok(Some(agent_id)) => agent_id,
            Ok(None) => {
                let e = HandoffError::AssignmentUnavailable {
                    tenant_id: tenant_id.to_string(),
                };
                warn!(tenant_id, conversation_id = %turn.conversation_id(), error = %e, "handover not possible");
                self.reply(turn, &replies.no_agent_available).await;
                return;
            }
            Err(e) => {
                error!(tenant_id, conversation_id = %turn.conversation_id(), error = %e, "agent lookup failed");
                self.reply(turn, &replies.no_agent_available).await;
                return;
            }
        };

        match self
            .storage
            .assign_conversation(turn.conversation_id(), &agent_id)
            .await
        {
            Ok(true) => {
                info!(tenant_id, conversation_id = %turn.conversation_id(), agent_id = %agent_id, "conversation handed to agent");
                self.reply(turn, &replies.agent_connected).await;
            }
            Ok(false) => {
                info!(tenant_id, conversation_id = %turn.conversation_id(), "conversation was assigned concurrently");
            }
            Err(e) => {
                error!(tenant_id, conversation_id = %turn.conversation_id(), agent_id = %agent_id, error = %e, "assignment failed");
                self.reply(turn, &replies.no_agent_available).await;
            }
        }
    }

    /// Sends a knowledge-base answer. `false` when none could be produced.
    async fn answer_from_knowledge(&self, turn: &Turn<'_>) -> bool {
        let Some(knowledge_base) = turn
            .resolved
            .tenant
            .knowledge_base
            .as_deref()
            .filter(|kb| !kb.trim().is_empty())
        else {
            debug!(tenant_id = %turn.tenant_id(), "no knowledge base configured");
            return false;
        };

        let call = self.enricher.answer_from_knowledge(
            &turn.message.body,
            &turn.thread.contact,
            knowledge_base,
        );
        match bounded(self.settings.enrichment_timeout, call).await {
            Ok(answer) => {
                self.reply(turn, &answer).await;
                true
            }
            Err(e) => {
                warn!(
                    tenant_id = %turn.tenant_id(),
                    conversation_id = %turn.conversation_id(),
                    error = %e,
                    "knowledge answer failed"
                );
                false
            }
        }
    }

    async fn send_welcome_menu(&self, turn: &Turn<'_>) {
        let menu = &self.settings.welcome_menu;
        let send = turn
            .channel
            .send_menu(&turn.resolved.credential, &turn.message.chat_id, menu);
        match bounded(self.settings.send_timeout, send).await {
            Ok(platform_id) => {
                self.persist_outbound(turn, ContentType::Menu, &menu.text, platform_id)
                    .await;
            }
            Err(e) => {
                warn!(
                    tenant_id = %turn.tenant_id(),
                    conversation_id = %turn.conversation_id(),
                    error = %e,
                    "welcome menu not delivered"
                );
            }
        }
    }

    /// Sends one text reply; failures are logged and swallowed.
    async fn reply(&self, turn: &Turn<'_>, text: &str) {
        let options = SendOptions::default();
        let send = turn.channel.send_text(
            &turn.resolved.credential,
            &turn.message.chat_id,
            text,
            &options,
        );
        match bounded(self.settings.send_timeout, send).await {
            Ok(platform_id) => {
                self.persist_outbound(turn, ContentType::Text, text, platform_id)
                    .await;
            }
            Err(e) => {
                warn!(
                    tenant_id = %turn.tenant_id(),
                    conversation_id = %turn.conversation_id(),
                    error = %e,
                    "reply not delivered"
                );
            }
        }
    }

    async fn persist_outbound(
        &self,
        turn: &Turn<'_>,
        content_type: ContentType,
        body: &str,
        platform_id: String,
    ) {
        let mut outbound =
            Message::outbound_bot(turn.tenant_id(), turn.conversation_id(), content_type, body);
        outbound.platform_message_id = Some(platform_id);

        let stored = async {
            self.storage.insert_message(&outbound).await?;
            self.storage
                .touch_conversation(turn.conversation_id(), false)
                .await
        };
        if let Err(e) = stored.await {
            error!(
                tenant_id = %turn.tenant_id(),
                conversation_id = %turn.conversation_id(),
                error = %e,
                "failed to record outbound message"
            );
        }
    }

    async fn acknowledge_callback(&self, turn: &Turn<'_>) {
        let InboundKind::Callback {
            callback_id: Some(callback_id),
            ..
        } = &turn.message.kind
        else {
            return;
        };
        let ack = turn
            .channel
            .acknowledge_callback(&turn.resolved.credential, callback_id);
        if let Err(e) = bounded(self.settings.send_timeout, ack).await {
            warn!(tenant_id = %turn.tenant_id(), error = %e, "callback acknowledgement failed");
        }
    }

    /// Merges the turn's classification into the contact's metadata.
    ///
    /// `last_intent` is always written. Tags, summary, sentiment, extracted
    /// fields and coaching come only from a successful enrichment, which also
    /// clears `ai_error`; a failed enrichment sets it.
    async fn record_classification(&self, turn: &Turn<'_>, classification: &Classification) {
        let mut patch = Map::new();
        patch.insert(
            metadata_keys::LAST_INTENT.to_string(),
            Value::String(classification.intent().to_string()),
        );

        let mut tags: &[String] = &[];
        match classification {
            Classification::Enriched(result) => {
                tags = &result.tags;
                patch.insert(metadata_keys::AI_ERROR.to_string(), Value::Null);
                patch.insert(
                    metadata_keys::SENTIMENT.to_string(),
                    Value::String(result.sentiment.to_string()),
                );
                if let Some(summary) = result.summary.as_deref().filter(|s| !s.trim().is_empty()) {
                    patch.insert(
                        metadata_keys::AI_SUMMARY.to_string(),
                        Value::String(summary.to_string()),
                    );
                    if let Err(e) = self
                        .storage
                        .set_conversation_summary(turn.conversation_id(), summary)
                        .await
                    {
                        error!(conversation_id = %turn.conversation_id(), error = %e, "failed to store summary");
                    }
                }
                if !result.extracted.is_empty() {
                    if let Ok(extracted) = serde_json::to_value(&result.extracted) {
                        patch.insert(metadata_keys::EXTRACTED.to_string(), extracted);
                    }
                }
                if let Ok(coaching) = serde_json::to_value(&result.coaching) {
                    patch.insert(metadata_keys::COACHING.to_string(), coaching);
                }
            }
            Classification::Failed(e) => {
                patch.insert(
                    metadata_keys::AI_ERROR.to_string(),
                    Value::String(format!("{}: {e}", e.kind())),
                );
            }
            Classification::Menu(_) | Classification::Skipped => {}
        }

        if let Err(e) = self
            .storage
            .merge_contact_metadata(&turn.thread.contact.id, patch, tags)
            .await
        {
            error!(
                tenant_id = %turn.tenant_id(),
                contact_id = %turn.thread.contact.id,
                error = %e,
                "failed to update contact metadata"
            );
        }
    }
}

fn record_action(action: BotAction) {
    metrics::counter!("handoff_routing_actions_total", "action" => action.as_str()).increment(1);
}
