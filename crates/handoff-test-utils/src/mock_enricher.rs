// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted enrichment provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use handoff_core::HandoffError;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::traits::enrichment::Enricher;
use handoff_core::types::{
    AdapterType, Coaching, Contact, EnrichmentResult, ExtractedFields, HealthStatus, Intent,
    Sentiment,
};

/// What the next enrichment calls return.
#[derive(Debug, Clone)]
pub enum EnrichBehavior {
    Succeed(EnrichmentResult),
    /// Non-transient provider failure.
    Reject,
    /// Retries exhausted.
    Unavailable,
}

/// A result with just an intent set.
pub fn result_with_intent(intent: Intent) -> EnrichmentResult {
    EnrichmentResult {
        intent,
        tags: Vec::new(),
        sentiment: Sentiment::Neutral,
        summary: None,
        extracted: ExtractedFields::default(),
        coaching: Coaching::default(),
    }
}

/// Mock [`Enricher`] with a single, replaceable behaviour.
pub struct MockEnricher {
    behavior: Mutex<EnrichBehavior>,
    knowledge_answer: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    enrich_calls: AtomicUsize,
    knowledge_calls: AtomicUsize,
}

impl MockEnricher {
    /// Classifies everything as [`Intent::General`].
    pub fn new() -> Self {
        Self::with_behavior(EnrichBehavior::Succeed(result_with_intent(Intent::General)))
    }

    pub fn with_behavior(behavior: EnrichBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            knowledge_answer: Mutex::new(None),
            delay: Mutex::new(None),
            enrich_calls: AtomicUsize::new(0),
            knowledge_calls: AtomicUsize::new(0),
        }
    }

    pub async fn set_behavior(&self, behavior: EnrichBehavior) {
        *self.behavior.lock().await = behavior;
    }

    pub async fn set_intent(&self, intent: Intent) {
        self.set_behavior(EnrichBehavior::Succeed(result_with_intent(intent)))
            .await;
    }

    /// Answer returned by `answer_from_knowledge`; `None` makes it fail.
    pub async fn set_knowledge_answer(&self, answer: Option<&str>) {
        *self.knowledge_answer.lock().await = answer.map(str::to_string);
    }

    /// Delay every call, to exercise timeouts.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    pub fn enrich_calls(&self) -> usize {
        self.enrich_calls.load(Ordering::SeqCst)
    }

    pub fn knowledge_calls(&self) -> usize {
        self.knowledge_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEnricher {
    fn name(&self) -> &str {
        "mock-enricher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Enrichment
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    async fn enrich(
        &self,
        _message: &str,
        _contact: &Contact,
        _knowledge_base: Option<&str>,
    ) -> Result<EnrichmentResult, HandoffError> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        match self.behavior.lock().await.clone() {
            EnrichBehavior::Succeed(result) => Ok(result),
            EnrichBehavior::Reject => Err(HandoffError::Provider {
                message: "mock provider rejected the request".into(),
                source: None,
            }),
            EnrichBehavior::Unavailable => Err(HandoffError::EnrichmentUnavailable {
                message: "mock provider retries exhausted".into(),
                source: None,
            }),
        }
    }

    async fn answer_from_knowledge(
        &self,
        _question: &str,
        _contact: &Contact,
        _knowledge_base: &str,
    ) -> Result<String, HandoffError> {
        self.knowledge_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.knowledge_answer
            .lock()
            .await
            .clone()
            .ok_or_else(|| HandoffError::Provider {
                message: "mock provider has no knowledge answer".into(),
                source: None,
            })
    }
}
