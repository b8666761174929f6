// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric names and descriptions.
//!
//! The counters themselves are emitted through the metrics-rs facade by the
//! crates that own each event; this module only names and describes them.

use metrics::describe_counter;

pub const WEBHOOKS_TOTAL: &str = "handoff_webhooks_total";
pub const ROUTING_ACTIONS_TOTAL: &str = "handoff_routing_actions_total";
pub const ENRICHMENT_FAILURES_TOTAL: &str = "handoff_enrichment_failures_total";
pub const CHANNEL_SEND_ERRORS_TOTAL: &str = "handoff_channel_send_errors_total";
pub const TICKET_SEND_ERRORS_TOTAL: &str = "handoff_ticket_send_errors_total";

/// Register all Handoff metric descriptions.
///
/// Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        WEBHOOKS_TOTAL,
        "Acknowledged webhook deliveries by channel and outcome"
    );
    describe_counter!(
        ROUTING_ACTIONS_TOTAL,
        "Bot decisions taken for processed messages"
    );
    describe_counter!(
        ENRICHMENT_FAILURES_TOTAL,
        "Enrichment calls that failed after retries, by provider"
    );
    describe_counter!(
        CHANNEL_SEND_ERRORS_TOTAL,
        "Outbound platform sends that failed"
    );
    describe_counter!(TICKET_SEND_ERRORS_TOTAL, "Support ticket e-mails that failed");
}
