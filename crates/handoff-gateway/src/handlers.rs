// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.

use std::collections::HashMap;
use std::str::FromStr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error, warn};

use handoff_core::HandoffError;
use handoff_core::types::{ChannelKind, WebhookRequest};

use crate::server::GatewayState;

/// Acknowledgement returned for every accepted delivery.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Maps a routing error to the status the platform sees.
fn rejection(e: &HandoffError) -> Response {
    match e {
        HandoffError::Authentication(_) => error_response(StatusCode::UNAUTHORIZED, "unauthorized"),
        HandoffError::TenantNotConfigured { .. } => {
            error_response(StatusCode::NOT_FOUND, "not configured")
        }
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
    }
}

fn parse_channel(channel: &str) -> Option<ChannelKind> {
    ChannelKind::from_str(channel).ok()
}

fn to_webhook_request(headers: &HeaderMap, body: Bytes) -> WebhookRequest {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(WebhookRequest::new(body.to_vec()), |request, (name, value)| {
            request.with_header(name, value)
        })
}

/// POST /webhooks/{channel}/{tenant_id}
pub async fn post_webhook(
    State(state): State<GatewayState>,
    Path((channel, tenant_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(kind) = parse_channel(&channel) else {
        return error_response(StatusCode::NOT_FOUND, "unknown channel");
    };

    let request = to_webhook_request(&headers, body);
    match state.router.handle_webhook(kind, &tenant_id, &request).await {
        Ok(outcomes) => {
            let labels: Vec<&str> = outcomes.iter().map(|o| o.label()).collect();
            debug!(%tenant_id, channel = %kind, outcomes = ?labels, "webhook acknowledged");
            (StatusCode::OK, Json(AckResponse { ok: true })).into_response()
        }
        Err(e) if e.is_request_rejection() => {
            warn!(%tenant_id, channel = %kind, error = %e, "webhook rejected");
            rejection(&e)
        }
        Err(e) => {
            error!(%tenant_id, channel = %kind, error = %e, "webhook failed before acknowledgement");
            rejection(&e)
        }
    }
}

/// GET /webhooks/{channel}/{tenant_id}
///
/// Subscription handshake: echoes the platform's challenge on success.
pub async fn get_webhook(
    State(state): State<GatewayState>,
    Path((channel, tenant_id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(kind) = parse_channel(&channel) else {
        return error_response(StatusCode::NOT_FOUND, "unknown channel");
    };

    match state
        .router
        .verify_subscription(kind, &tenant_id, &query)
        .await
    {
        Ok(Some(challenge)) => (StatusCode::OK, challenge).into_response(),
        Ok(None) => {
            warn!(%tenant_id, channel = %kind, "subscription verification refused");
            error_response(StatusCode::FORBIDDEN, "verification failed")
        }
        Err(e) => {
            warn!(%tenant_id, channel = %kind, error = %e, "subscription verification failed");
            rejection(&e)
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "metrics disabled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_segment_is_snake_case() {
        assert_eq!(parse_channel("telegram"), Some(ChannelKind::Telegram));
        assert_eq!(parse_channel("whatsapp"), Some(ChannelKind::Whatsapp));
        assert_eq!(parse_channel("signal"), None);
    }

    #[test]
    fn headers_are_carried_over_lower_cased() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Hub-Signature-256", "sha256=abc".parse().unwrap());
        let request = to_webhook_request(&headers, Bytes::from_static(b"{}"));
        assert_eq!(request.header("x-hub-signature-256"), Some("sha256=abc"));
        assert_eq!(request.body, b"{}");
    }

    #[test]
    fn only_rejections_map_to_client_errors() {
        let auth = rejection(&HandoffError::Authentication("bad".into()));
        assert_eq!(auth.status(), StatusCode::UNAUTHORIZED);

        let missing = rejection(&HandoffError::TenantNotConfigured {
            tenant_id: "t".into(),
            channel: "telegram".into(),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let storage = rejection(&HandoffError::Internal("disk".into()));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn health_response_serializes() {
        let json = serde_json::to_string(&HealthResponse {
            status: "ok".into(),
            version: "0.1.0".into(),
            uptime_secs: 42,
        })
        .unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
    }
}
