// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot/agent handoff decision table.
//!
//! A conversation is either in bot mode (no assignee) or agent mode. The
//! action for an inbound message is the first row of [`DECISION_TABLE`]
//! whose predicate matches the turn. The welcome menu is decided
//! separately by [`sends_welcome_menu`] because it is sent in addition to
//! whatever the table picks.

use handoff_core::types::{Conversation, ConversationMode, Intent};
use strum::{Display, IntoStaticStr};

/// What is known about a turn when the action is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnFacts {
    pub agent_mode: bool,
    /// The conversation was created by this request.
    pub is_first: bool,
    /// Classified intent; [`Intent::Unclassified`] when enrichment failed or did not run.
    pub intent: Intent,
}

impl TurnFacts {
    pub fn new(conversation: &Conversation, is_first: bool) -> Self {
        Self {
            agent_mode: matches!(conversation.mode(), ConversationMode::Agent { .. }),
            is_first,
            intent: Intent::Unclassified,
        }
    }

    pub fn with_intent(self, intent: Intent) -> Self {
        Self { intent, ..self }
    }
}

/// The automatic action taken for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BotAction {
    /// An agent owns the conversation; store only.
    DeferToAgent,
    FileTicket,
    RequestHandover,
    AnswerFromKnowledge,
    /// The welcome menu already answered this turn.
    SuppressReply,
    GenericReply,
}

impl BotAction {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&TurnFacts) -> bool,
    pub action: BotAction,
}

fn agent_owns(facts: &TurnFacts) -> bool {
    facts.agent_mode
}

fn wants_support(facts: &TurnFacts) -> bool {
    facts.intent == Intent::SupportRequest
}

fn wants_human(facts: &TurnFacts) -> bool {
    facts.intent == Intent::HandoverRequest
}

fn asks_question(facts: &TurnFacts) -> bool {
    facts.intent == Intent::KnowledgeQuery
}

fn opened_conversation(facts: &TurnFacts) -> bool {
    facts.is_first
}

fn always(_: &TurnFacts) -> bool {
    true
}

/// Evaluated top to bottom; the last row always matches.
pub const DECISION_TABLE: &[Rule] = &[
    Rule {
        name: "agent_mode",
        applies: agent_owns,
        action: BotAction::DeferToAgent,
    },
    Rule {
        name: "support_request",
        applies: wants_support,
        action: BotAction::FileTicket,
    },
    Rule {
        name: "handover_request",
        applies: wants_human,
        action: BotAction::RequestHandover,
    },
    Rule {
        name: "knowledge_query",
        applies: asks_question,
        action: BotAction::AnswerFromKnowledge,
    },
    Rule {
        name: "first_message",
        applies: opened_conversation,
        action: BotAction::SuppressReply,
    },
    Rule {
        name: "fallback",
        applies: always,
        action: BotAction::GenericReply,
    },
];

pub fn decide(facts: &TurnFacts) -> BotAction {
    DECISION_TABLE
        .iter()
        .find(|rule| (rule.applies)(facts))
        .map_or(BotAction::GenericReply, |rule| rule.action)
}

/// The action used when a planned automatic answer cannot be produced
/// (no knowledge base, failed knowledge answer).
pub fn degraded_reply(facts: &TurnFacts) -> BotAction {
    if facts.is_first {
        BotAction::SuppressReply
    } else {
        BotAction::GenericReply
    }
}

pub fn sends_welcome_menu(facts: &TurnFacts) -> bool {
    !facts.agent_mode && facts.is_first
}
