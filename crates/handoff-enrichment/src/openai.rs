// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI Chat Completions client with `response_format: json_object`.

use std::time::Duration;

use handoff_core::error::HandoffError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::retry::{AttemptError, RetryPolicy, classify_send_error, classify_status, run_with_retry};

const PROVIDER: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// HTTP client for the OpenAI API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    policy: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, HandoffError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| HandoffError::Config(format!("invalid OpenAI API key header: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

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
            policy: RetryPolicy::openai(),
        })
    }

    /// Replaces the retry policy (tests shorten the backoff).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Sends one prompt pair and returns the assistant message content.
    pub async fn complete_json(&self, system: &str, user: &str) -> Result<String, HandoffError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: 0.2,
        };

        run_with_retry(PROVIDER, &self.policy, || self.attempt(&request)).await
    }

    async fn attempt(&self, request: &ChatRequest<'_>) -> Result<String, AttemptError> {
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
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("openai returned {status}: {}", api_err.error.message),
                Err(_) => format!("openai returned {status}: {body}"),
            };
            return Err(match classify_status(status) {
                Some(reason) => AttemptError::Transient { reason, message },
                None => AttemptError::Fatal(HandoffError::Provider {
                    message,
                    source: None,
                }),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            AttemptError::Fatal(HandoffError::Provider {
                message: format!("failed to parse openai response: {e}"),
                source: Some(Box::new(e)),
            })
        })?;

        parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| {
                AttemptError::Fatal(HandoffError::Provider {
                    message: "openai response contained no message content".into(),
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

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            rate_limit_step: Duration::from_millis(2),
            server_error_step: Duration::from_millis(1),
        }
    }

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new("sk-test", "gpt-4o-mini", &server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(fast_policy())
    }

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        }))
    }

    #[tokio::test]
    async fn sends_json_object_response_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(completion(r#"{"intent":"knowledge_query"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .complete_json("system", "what are your hours?")
            .await
            .unwrap();
        assert_eq!(text, r#"{"intent":"knowledge_query"}"#);
    }

    #[tokio::test]
    async fn exhausts_three_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_json("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::EnrichmentUnavailable { .. }));
    }

    #[tokio::test]
    async fn bad_request_fails_immediately_with_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_json("s", "u")
            .await
            .unwrap_err();
        match err {
            HandoffError::Provider { message, .. } => {
                assert!(message.contains("Incorrect API key provided"));
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(completion(r#"{"intent":"general"}"#))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client_for(&server).complete_json("s", "u").await.is_ok());
    }
}
