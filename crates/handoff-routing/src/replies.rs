// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply text selection and welcome-menu payloads.

use handoff_core::types::{EnrichmentResult, Intent};

pub const MENU_SUPPORT: &str = "menu:support";
pub const MENU_AGENT: &str = "menu:agent";
pub const MENU_FAQ: &str = "menu:faq";

/// Intent fixed by a welcome-menu button, if the payload is one of ours.
pub fn menu_intent(payload: &str) -> Option<Intent> {
    match payload {
        MENU_SUPPORT => Some(Intent::SupportRequest),
        MENU_AGENT => Some(Intent::HandoverRequest),
        MENU_FAQ => Some(Intent::KnowledgeQuery),
        _ => None,
    }
}

/// First non-blank suggested reply from enrichment, else `fallback`.
pub fn generic_reply<'a>(enrichment: Option<&'a EnrichmentResult>, fallback: &'a str) -> &'a str {
    enrichment
        .into_iter()
        .flat_map(|e| e.coaching.suggested_replies.iter())
        .map(|r| r.trim())
        .find(|r| !r.is_empty())
        .unwrap_or(fallback)
}
