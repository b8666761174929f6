// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support-ticket notification collaborator.

use async_trait::async_trait;

use crate::traits::adapter::PluginAdapter;
use crate::types::Contact;

/// Delivers a support ticket to a tenant's support address.
///
/// Failure is reported as `false` rather than an error: the routing engine
/// never aborts a turn because a ticket could not be delivered.
#[async_trait]
pub trait TicketNotifier: PluginAdapter {
    async fn send_support_ticket(
        &self,
        to: &str,
        contact: &Contact,
        issue_text: &str,
        conversation_id: &str,
    ) -> bool;
}
