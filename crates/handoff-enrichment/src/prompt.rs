// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt construction and response decoding.
//!
//! Both providers run in JSON mode, so the same prompts and the same
//! decoders serve either one.

use handoff_core::error::HandoffError;
use handoff_core::types::{Contact, EnrichmentResult, metadata_keys};
use serde::Deserialize;

pub const ENRICH_SYSTEM_PROMPT: &str = r#"You triage inbound customer-support chat messages for a business.
Reply with exactly one JSON object and nothing else, using this shape:
{
  "intent": "support_request" | "handover_request" | "knowledge_query" | "general",
  "tags": [short lowercase topic tags],
  "sentiment": "positive" | "neutral" | "negative",
  "summary": one sentence describing what the customer wants,
  "extracted": {"name": string|null, "email": string|null, "phone": string|null, "company": string|null},
  "coaching": {
    "insights": [strings],
    "next_step": string|null,
    "objection_handling": string|null,
    "suggested_replies": [short replies the business could send]
  }
}
Intent rules:
- support_request: the customer reports a problem, bug, complaint, or asks for a ticket.
- handover_request: the customer asks to talk to a human, agent, or specialist.
- knowledge_query: the customer asks a factual question the business knowledge base could answer.
- general: greetings, thanks, small talk, anything else."#;

pub const KNOWLEDGE_SYSTEM_PROMPT: &str = r#"You answer customer questions for a business using only the knowledge base provided.
Reply with exactly one JSON object: {"answer": "<reply to send to the customer>"}.
If the knowledge base does not contain the answer, say so politely and offer to connect the customer with the team.
Keep the answer under 80 words."#;

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn contact_context(contact: &Contact) -> String {
    let mut lines = Vec::new();
    if let Some(name) = contact.display_name.as_deref() {
        lines.push(format!("Customer name: {name}"));
    }
    if !contact.tags.is_empty() {
        lines.push(format!("Known tags: {}", contact.tags.join(", ")));
    }
    if let Some(intent) = contact
        .metadata
        .get(metadata_keys::LAST_INTENT)
        .and_then(|v| v.as_str())
    {
        lines.push(format!("Previous intent: {intent}"));
    }
    if let Some(summary) = contact
        .metadata
        .get(metadata_keys::AI_SUMMARY)
        .and_then(|v| v.as_str())
    {
        lines.push(format!("Previous summary: {summary}"));
    }
    lines.join("\n")
}

/// User turn for the classification call.
pub fn enrich_user_prompt(
    message: &str,
    contact: &Contact,
    knowledge_base: Option<&str>,
    knowledge_max_chars: usize,
) -> String {
    let mut prompt = String::new();
    let context = contact_context(contact);
    if !context.is_empty() {
        prompt.push_str(&context);
        prompt.push_str("\n\n");
    }
    if let Some(kb) = knowledge_base.filter(|kb| !kb.trim().is_empty()) {
        prompt.push_str("Knowledge base topics (for classifying knowledge_query):\n");
        prompt.push_str(truncate_chars(kb, knowledge_max_chars));
        prompt.push_str("\n\n");
    }
    prompt.push_str("Customer message:\n");
    prompt.push_str(message);
    prompt
}

/// User turn for the knowledge-answer call.
pub fn knowledge_user_prompt(
    question: &str,
    contact: &Contact,
    knowledge_base: &str,
    knowledge_max_chars: usize,
) -> String {
    let mut prompt = format!(
        "Knowledge base:\n{}\n\n",
        truncate_chars(knowledge_base, knowledge_max_chars)
    );
    if let Some(name) = contact.display_name.as_deref() {
        prompt.push_str(&format!("Customer name: {name}\n"));
    }
    prompt.push_str("Question:\n");
    prompt.push_str(question);
    prompt
}

/// Models occasionally wrap JSON-mode output in a markdown fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Decodes the classification object. Schema mismatches are non-transient.
pub fn parse_enrichment(provider: &str, text: &str) -> Result<EnrichmentResult, HandoffError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| HandoffError::Provider {
        message: format!("{provider} returned an enrichment object that does not match the schema: {e}"),
        source: Some(Box::new(e)),
    })
}

#[derive(Debug, Deserialize)]
struct KnowledgeAnswer {
    answer: String,
}

/// Decodes `{"answer": "..."}`; an empty answer is treated as a failure.
pub fn parse_knowledge_answer(provider: &str, text: &str) -> Result<String, HandoffError> {
    let parsed: KnowledgeAnswer =
        serde_json::from_str(strip_code_fence(text)).map_err(|e| HandoffError::Provider {
            message: format!("{provider} returned an unreadable knowledge answer: {e}"),
            source: Some(Box::new(e)),
        })?;

    let answer = parsed.answer.trim();
    if answer.is_empty() {
        return Err(HandoffError::Provider {
            message: format!("{provider} returned an empty knowledge answer"),
            source: None,
        });
    }
    Ok(answer.to_string())
}
