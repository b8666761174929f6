// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact and open-conversation resolution.
//!
//! Uniqueness is left to the datastore: the contact lookup is a
//! find-or-create, and the inbound message is stored together with the
//! conversation it opens, so both stay correct when several processes race
//! on the same `(tenant, chat)` pair.

use std::sync::Arc;

use handoff_core::error::HandoffError;
use handoff_core::traits::storage::StorageAdapter;
use handoff_core::types::{
    ChannelKind, Contact, Conversation, Message, NewContact, NormalizedMessage,
};
use tracing::info;

/// The contact and thread an inbound message belongs to.
#[derive(Debug, Clone)]
pub struct ResolvedThread {
    pub contact: Contact,
    pub conversation: Conversation,
    /// `true` only when this message opened the conversation.
    pub is_new: bool,
    /// The stored inbound row.
    pub inbound: Message,
}

#[derive(Clone)]
pub struct ThreadResolver {
    storage: Arc<dyn StorageAdapter>,
}

impl ThreadResolver {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Stores `message` in its contact's open thread.
    ///
    /// Returns `None` for a platform message that is already stored; no
    /// conversation is opened or touched in that case.
    pub async fn record(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
        message: &NormalizedMessage,
    ) -> Result<Option<ResolvedThread>, HandoffError> {
        let contact = self
            .storage
            .find_or_create_contact(&NewContact {
                tenant_id: tenant_id.to_string(),
                channel,
                external_id: message.chat_id.clone(),
                display_name: message.sender.display_name.clone(),
                username: message.sender.username.clone(),
            })
            .await?;

        let Some(recorded) = self
            .storage
            .record_inbound(tenant_id, &contact.id, channel, message)
            .await?
        else {
            return Ok(None);
        };

        if recorded.opened {
            info!(
                tenant_id,
                contact_id = %contact.id,
                conversation_id = %recorded.conversation.id,
                "conversation opened"
            );
        }

        Ok(Some(ResolvedThread {
            contact,
            conversation: recorded.conversation,
            is_new: recorded.opened,
            inbound: recorded.message,
        }))
    }
}
