// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini `generateContent` client in JSON mode.

use std::time::Duration;

use handoff_core::error::HandoffError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::retry::{AttemptError, RetryPolicy, classify_send_error, classify_status, run_with_retry};

const PROVIDER: &str = "gemini";

/// Minimum length of a plausible Gemini API key.
const MIN_KEY_LEN: usize = 30;

/// Returns true when `key` looks like a usable Gemini API key.
///
/// Placeholder values left in config files (`""`, `"changeme"`) fail this
/// check so the OpenAI provider is selected instead.
pub fn is_well_formed_key(key: &str) -> bool {
    let key = key.trim();
    key.starts_with("AIza") && key.len() >= MIN_KEY_LEN
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    policy: RetryPolicy,
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, HandoffError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|e| HandoffError::Config(format!("invalid Gemini API key header: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| HandoffError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            policy: RetryPolicy::gemini(),
        })
    }

    /// Replaces the retry policy (tests shorten the backoff).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Sends one prompt pair and returns the raw JSON text of the first candidate.
    pub async fn complete_json(&self, system: &str, user: &str) -> Result<String, HandoffError> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.2,
            },
        };

        run_with_retry(PROVIDER, &self.policy, || self.attempt(&request)).await
    }

    async fn attempt(&self, request: &GenerateRequest<'_>) -> Result<String, AttemptError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|e| classify_send_error(PROVIDER, e))?;

        let status = response.status();
        debug!(provider = PROVIDER, status = %status, "response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("gemini returned {status}: {body}");
            return Err(match classify_status(status) {
                Some(reason) => AttemptError::Transient { reason, message },
                None => AttemptError::Fatal(HandoffError::Provider {
                    message,
                    source: None,
                }),
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            AttemptError::Fatal(HandoffError::Provider {
                message: format!("failed to parse gemini response: {e}"),
                source: Some(Box::new(e)),
            })
        })?;

        parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| {
                AttemptError::Fatal(HandoffError::Provider {
                    message: "gemini response contained no text candidate".into(),
                    source: None,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "AIzaSyTestTestTestTestTestTestTest12";

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            rate_limit_step: Duration::from_millis(1),
            server_error_step: Duration::from_millis(1),
        }
    }

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(KEY, "gemini-1.5-flash", &server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(fast_policy())
    }

    fn candidate(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        }))
    }

    #[test]
    fn key_shape_check() {
        assert!(is_well_formed_key(KEY));
        assert!(!is_well_formed_key(""));
        assert!(!is_well_formed_key("changeme"));
        assert!(!is_well_formed_key("AIzaShort"));
        assert!(!is_well_formed_key("sk-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"));
    }

    #[tokio::test]
    async fn requests_json_mode_and_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", KEY))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"responseMimeType": "application/json"},
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}]
            })))
            .respond_with(candidate(r#"{"intent":"general"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .complete_json("system", "hello")
            .await
            .unwrap();
        assert_eq!(text, r#"{"intent":"general"}"#);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(candidate(r#"{"intent":"general"}"#))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client_for(&server).complete_json("s", "u").await.is_ok());
    }

    #[tokio::test]
    async fn exhausts_two_retries_on_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_json("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::EnrichmentUnavailable { .. }));
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_json("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Provider { .. }));
    }

    #[tokio::test]
    async fn empty_candidates_are_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_json("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Provider { .. }));
    }
}
