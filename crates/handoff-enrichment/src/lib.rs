// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language-model enrichment for the Handoff routing engine.
//!
//! Exactly one provider serves every call: Gemini when a well-formed key
//! is configured, otherwise OpenAI. There is no mid-call switching; each
//! provider applies its own retry budget and the whole call is bounded by
//! `enrichment.timeout_secs`.

pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod retry;

use std::time::Duration;

use async_trait::async_trait;
use handoff_config::model::EnrichmentConfig;
use handoff_core::error::HandoffError;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::traits::enrichment::Enricher;
use handoff_core::types::{AdapterType, Contact, EnrichmentResult, HealthStatus};
use tracing::{debug, info, warn};

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;

/// The provider selected for this process.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(GeminiClient),
    OpenAi(OpenAiClient),
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini(_) => "gemini",
            Provider::OpenAi(_) => "openai",
        }
    }

    async fn complete_json(&self, system: &str, user: &str) -> Result<String, HandoffError> {
        match self {
            Provider::Gemini(client) => client.complete_json(system, user).await,
            Provider::OpenAi(client) => client.complete_json(system, user).await,
        }
    }

    /// Chooses the provider from configured credentials.
    ///
    /// Returns `Ok(None)` when neither key is usable.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Option<Self>, HandoffError> {
        let timeout = Duration::from_secs(config.timeout_secs);

        if let Some(key) = config
            .gemini_api_key
            .as_deref()
            .filter(|k| gemini::is_well_formed_key(k))
        {
            let client = GeminiClient::new(key, &config.gemini_model, &config.gemini_base_url, timeout)?;
            return Ok(Some(Provider::Gemini(client)));
        }

        if config.gemini_api_key.is_some() {
            warn!("enrichment.gemini_api_key is not a well-formed Gemini key; ignoring it");
        }

        if let Some(key) = config
            .openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
        {
            let client = OpenAiClient::new(key, &config.openai_model, &config.openai_base_url, timeout)?;
            return Ok(Some(Provider::OpenAi(client)));
        }

        Ok(None)
    }
}

/// [`Enricher`] backed by the selected language-model provider.
pub struct EnrichmentClient {
    provider: Provider,
    timeout: Duration,
    knowledge_max_chars: usize,
}

impl EnrichmentClient {
    pub fn new(provider: Provider, timeout: Duration, knowledge_max_chars: usize) -> Self {
        Self {
            provider,
            timeout,
            knowledge_max_chars,
        }
    }

    /// Builds the client from `[enrichment]`, or `None` when no provider is configured.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Option<Self>, HandoffError> {
        let Some(provider) = Provider::from_config(config)? else {
            return Ok(None);
        };
        info!(provider = provider.name(), "enrichment provider selected");
        Ok(Some(Self::new(
            provider,
            Duration::from_secs(config.timeout_secs),
            config.knowledge_max_chars,
        )))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Runs one JSON-mode call under the overall timeout.
    async fn call(&self, system: &str, user: &str) -> Result<String, HandoffError> {
        let provider = self.provider.name();
        let result = match tokio::time::timeout(self.timeout, self.provider.complete_json(system, user))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(HandoffError::EnrichmentUnavailable {
                message: format!("{provider} did not answer within {:?}", self.timeout),
                source: None,
            }),
        };

        if let Err(e) = &result {
            metrics::counter!("handoff_enrichment_failures_total", "provider" => provider)
                .increment(1);
            warn!(provider, error = %e, "enrichment call failed");
        }
        result
    }
}

#[async_trait]
impl PluginAdapter for EnrichmentClient {
    fn name(&self) -> &str {
        self.provider.name()
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
impl Enricher for EnrichmentClient {
    async fn enrich(
        &self,
        message: &str,
        contact: &Contact,
        knowledge_base: Option<&str>,
    ) -> Result<EnrichmentResult, HandoffError> {
        let user = prompt::enrich_user_prompt(
            message,
            contact,
            knowledge_base,
            self.knowledge_max_chars,
        );
        let text = self.call(prompt::ENRICH_SYSTEM_PROMPT, &user).await?;
        let result = prompt::parse_enrichment(self.provider.name(), &text)?;
        debug!(
            contact_id = %contact.id,
            intent = %result.intent,
            sentiment = %result.sentiment,
            "message enriched"
        );
        Ok(result)
    }

    async fn answer_from_knowledge(
        &self,
        question: &str,
        contact: &Contact,
        knowledge_base: &str,
    ) -> Result<String, HandoffError> {
        let user =
            prompt::knowledge_user_prompt(question, contact, knowledge_base, self.knowledge_max_chars);
        let text = self.call(prompt::KNOWLEDGE_SYSTEM_PROMPT, &user).await?;
        prompt::parse_knowledge_answer(self.provider.name(), &text)
    }
}

/// Stand-in used when no provider key is configured.
///
/// Every call fails with [`HandoffError::EnrichmentUnavailable`], so
/// routing always takes the unclassified fallback path.
#[derive(Debug, Default)]
pub struct DisabledEnricher;

#[async_trait]
impl PluginAdapter for DisabledEnricher {
    fn name(&self) -> &str {
        "disabled"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Enrichment
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Degraded(
            "no enrichment provider configured".into(),
        ))
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl Enricher for DisabledEnricher {
    async fn enrich(
        &self,
        _message: &str,
        _contact: &Contact,
        _knowledge_base: Option<&str>,
    ) -> Result<EnrichmentResult, HandoffError> {
        Err(HandoffError::EnrichmentUnavailable {
            message: "no enrichment provider configured".into(),
            source: None,
        })
    }

    async fn answer_from_knowledge(
        &self,
        _question: &str,
        _contact: &Contact,
        _knowledge_base: &str,
    ) -> Result<String, HandoffError> {
        Err(HandoffError::EnrichmentUnavailable {
            message: "no enrichment provider configured".into(),
            source: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::types::{ChannelKind, Intent};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GEMINI_KEY: &str = "AIzaSyTestTestTestTestTestTestTest12";

    fn contact() -> Contact {
        Contact {
            id: "c1".into(),
            tenant_id: "t1".into(),
            channel: ChannelKind::Whatsapp,
            external_id: "15550001111".into(),
            display_name: Some("Rita".into()),
            username: None,
            tags: vec![],
            metadata: serde_json::Map::new(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            rate_limit_step: Duration::ZERO,
            server_error_step: Duration::ZERO,
        }
    }

    #[test]
    fn prefers_gemini_when_key_is_well_formed() {
        let config = EnrichmentConfig {
            gemini_api_key: Some(GEMINI_KEY.into()),
            openai_api_key: Some("sk-test".into()),
            ..EnrichmentConfig::default()
        };
        let provider = Provider::from_config(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn falls_back_to_openai_for_malformed_gemini_key() {
        let config = EnrichmentConfig {
            gemini_api_key: Some("your-key-here".into()),
            openai_api_key: Some("sk-test".into()),
            ..EnrichmentConfig::default()
        };
        let provider = Provider::from_config(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn no_usable_key_selects_nothing() {
        let config = EnrichmentConfig {
            gemini_api_key: Some("bad".into()),
            openai_api_key: Some("  ".into()),
            ..EnrichmentConfig::default()
        };
        assert!(EnrichmentClient::from_config(&config).unwrap().is_none());
        assert!(
            EnrichmentClient::from_config(&EnrichmentConfig::default())
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn enrich_decodes_provider_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content":
                    "{\"intent\":\"support_request\",\"tags\":[\"Refund\"],\"summary\":\"Refund please\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", "gpt-4o-mini", &server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(no_backoff());
        let enricher = EnrichmentClient::new(Provider::OpenAi(client), Duration::from_secs(5), 1000);

        let result = enricher
            .enrich("I want my money back", &contact(), None)
            .await
            .unwrap();
        assert_eq!(result.intent, Intent::SupportRequest);
        assert_eq!(result.summary.as_deref(), Some("Refund please"));
    }

    #[tokio::test]
    async fn schema_mismatch_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "{\"label\":\"support\"}"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(GEMINI_KEY, "gemini-1.5-flash", &server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(no_backoff());
        let enricher = EnrichmentClient::new(Provider::Gemini(client), Duration::from_secs(5), 1000);

        let err = enricher.enrich("hi", &contact(), None).await.unwrap_err();
        assert!(matches!(err, HandoffError::Provider { .. }));
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", "gpt-4o-mini", &server.uri(), Duration::from_secs(10))
            .unwrap()
            .with_retry_policy(no_backoff());
        let enricher =
            EnrichmentClient::new(Provider::OpenAi(client), Duration::from_millis(100), 1000);

        let err = enricher.enrich("hi", &contact(), None).await.unwrap_err();
        assert!(matches!(err, HandoffError::EnrichmentUnavailable { .. }));
    }

    #[tokio::test]
    async fn knowledge_answer_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"answer\":\"We open at 9am.\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", "gpt-4o-mini", &server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(no_backoff());
        let enricher = EnrichmentClient::new(Provider::OpenAi(client), Duration::from_secs(5), 1000);

        let answer = enricher
            .answer_from_knowledge("When do you open?", &contact(), "Hours: 9am-6pm")
            .await
            .unwrap();
        assert_eq!(answer, "We open at 9am.");
    }

    #[tokio::test]
    async fn disabled_enricher_is_always_unavailable() {
        let err = DisabledEnricher
            .enrich("hi", &contact(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::EnrichmentUnavailable { .. }));
    }
}
