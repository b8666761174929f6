// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the persistence collaborator.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::HandoffError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Agent, AgentLoad, ChannelCredential, ChannelKind, Contact, Conversation, Message, NewContact,
    NormalizedMessage, RecordedInbound, Tenant,
};

/// Persistence for tenants, contacts, conversations, and messages.
///
/// Every find-or-create operation must be safe when several processes
/// race on the same key; in-process locking is not sufficient.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), HandoffError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), HandoffError>;

    // --- Tenants ---

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, HandoffError>;

    async fn get_channel_credential(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
    ) -> Result<Option<ChannelCredential>, HandoffError>;

    async fn upsert_tenant(&self, tenant: &Tenant) -> Result<(), HandoffError>;

    async fn upsert_channel_credential(
        &self,
        credential: &ChannelCredential,
    ) -> Result<(), HandoffError>;

    // --- Agents ---

    async fn upsert_agent(&self, agent: &Agent) -> Result<(), HandoffError>;

    async fn list_agents(&self, tenant_id: &str) -> Result<Vec<Agent>, HandoffError>;

    /// Open-conversation counts for every eligible (active, non-admin) agent.
    async fn list_agent_loads(&self, tenant_id: &str) -> Result<Vec<AgentLoad>, HandoffError>;

    // --- Contacts ---

    /// Returns the existing contact for `(tenant, channel, external_id)` or
    /// inserts a new one. Profile fields are refreshed when present.
    async fn find_or_create_contact(&self, contact: &NewContact) -> Result<Contact, HandoffError>;

    async fn get_contact(&self, contact_id: &str) -> Result<Option<Contact>, HandoffError>;

    /// Merges `patch` into the contact's metadata (last write wins per key)
    /// and adds `tags` to its tag set.
    async fn merge_contact_metadata(
        &self,
        contact_id: &str,
        patch: Map<String, Value>,
        tags: &[String],
    ) -> Result<(), HandoffError>;

    // --- Conversations ---

    /// Returns the single open conversation for the contact, creating one if
    /// none exists. The flag is `true` only for the caller that created it.
    async fn find_or_create_open_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
        channel: ChannelKind,
    ) -> Result<(Conversation, bool), HandoffError>;

    /// Sets `last_message_at` to now and, for inbound messages, increments
    /// the unread counter.
    async fn touch_conversation(
        &self,
        conversation_id: &str,
        increment_unread: bool,
    ) -> Result<(), HandoffError>;

    /// Assigns the conversation if it is still open and unassigned.
    /// Returns `false` when another writer got there first.
    async fn assign_conversation(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<bool, HandoffError>;

    async fn set_conversation_summary(
        &self,
        conversation_id: &str,
        summary: &str,
    ) -> Result<(), HandoffError>;

    // --- Messages ---

    /// Stores an inbound platform message in the contact's open
    /// conversation, opening one if none exists, and bumps that
    /// conversation's unread counter.
    ///
    /// The dedupe check, the conversation find-or-create and the insert
    /// happen in one transaction. A replayed message returns `None` and
    /// leaves every conversation untouched, and `opened` is `true` only for
    /// the message whose insert opened the conversation.
    async fn record_inbound(
        &self,
        tenant_id: &str,
        contact_id: &str,
        channel: ChannelKind,
        message: &NormalizedMessage,
    ) -> Result<Option<RecordedInbound>, HandoffError>;

    /// Appends a message. Returns `false` when a message with the same
    /// dedupe key already exists for the tenant.
    async fn insert_message(&self, message: &Message) -> Result<bool, HandoffError>;

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, HandoffError>;
}
