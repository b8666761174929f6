// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enrichment trait: one language-model call per inbound message.

use async_trait::async_trait;

use crate::error::HandoffError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Contact, EnrichmentResult};

/// Classifies a customer message and produces coaching data in a single call.
///
/// Implementations own their retry policy. Once retries are exhausted, or
/// the call times out, they return [`HandoffError::EnrichmentUnavailable`];
/// non-transient failures surface as [`HandoffError::Provider`].
#[async_trait]
pub trait Enricher: PluginAdapter {
    async fn enrich(
        &self,
        message: &str,
        contact: &Contact,
        knowledge_base: Option<&str>,
    ) -> Result<EnrichmentResult, HandoffError>;

    /// Answers a question using only the tenant's knowledge base.
    async fn answer_from_knowledge(
        &self,
        question: &str,
        contact: &Contact,
        knowledge_base: &str,
    ) -> Result<String, HandoffError>;
}
