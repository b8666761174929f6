// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with linear backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use handoff_core::error::HandoffError;
use reqwest::StatusCode;
use tracing::warn;

/// Why an attempt failed transiently. Selects the backoff step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transient {
    RateLimited,
    ServerError,
    /// Connection refused, reset, or request timeout.
    Transport,
}

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum AttemptError {
    Transient { reason: Transient, message: String },
    Fatal(HandoffError),
}

/// Retry budget and backoff steps for one provider.
///
/// The delay before retry `n` (1-based) is `step * n`, where the step
/// depends on whether the provider rate-limited or failed server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub rate_limit_step: Duration,
    pub server_error_step: Duration,
}

impl RetryPolicy {
    /// Gemini: 2 retries, 1s x attempt.
    pub const fn gemini() -> Self {
        Self {
            max_retries: 2,
            rate_limit_step: Duration::from_secs(1),
            server_error_step: Duration::from_secs(1),
        }
    }

    /// OpenAI: 3 retries, 2s x attempt on 429 and 1s x attempt otherwise.
    pub const fn openai() -> Self {
        Self {
            max_retries: 3,
            rate_limit_step: Duration::from_secs(2),
            server_error_step: Duration::from_secs(1),
        }
    }

    pub fn delay(&self, reason: Transient, retry: u32) -> Duration {
        let step = match reason {
            Transient::RateLimited => self.rate_limit_step,
            Transient::ServerError | Transient::Transport => self.server_error_step,
        };
        step * retry
    }
}

/// Classifies an HTTP status. `None` means the failure is not retryable.
pub fn classify_status(status: StatusCode) -> Option<Transient> {
    match status.as_u16() {
        429 => Some(Transient::RateLimited),
        500 | 502 | 503 | 504 => Some(Transient::ServerError),
        _ => None,
    }
}

/// Maps a reqwest send error to an attempt failure.
pub fn classify_send_error(provider: &str, err: reqwest::Error) -> AttemptError {
    if err.is_timeout() || err.is_connect() {
        AttemptError::Transient {
            reason: Transient::Transport,
            message: format!("{provider} request failed: {err}"),
        }
    } else {
        AttemptError::Fatal(HandoffError::Provider {
            message: format!("{provider} request failed: {err}"),
            source: Some(Box::new(err)),
        })
    }
}

/// Runs `op` until it succeeds, fails fatally, or the retry budget is spent.
///
/// Exhaustion yields [`HandoffError::EnrichmentUnavailable`]; fatal
/// failures are returned unchanged on the first occurrence.
pub async fn run_with_retry<T, F, Fut>(
    provider: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, HandoffError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut last_message = String::new();

    for attempt in 0..=policy.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Transient { reason, message }) => {
                if attempt < policy.max_retries {
                    let delay = policy.delay(reason, attempt + 1);
                    warn!(
                        provider,
                        attempt = attempt + 1,
                        ?reason,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "transient provider failure, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_message = message;
            }
        }
    }

    Err(HandoffError::EnrichmentUnavailable {
        message: format!(
            "{provider} failed after {} retries: {last_message}",
            policy.max_retries
        ),
        source: None,
    })
}
