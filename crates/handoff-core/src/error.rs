// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Handoff routing engine.

use thiserror::Error;

/// The primary error type used across all Handoff adapter traits and core operations.
///
/// Only [`Authentication`](HandoffError::Authentication) and
/// [`TenantNotConfigured`](HandoffError::TenantNotConfigured) ever change the
/// HTTP response returned to a chat platform. Every other variant is absorbed
/// by the routing orchestrator and turned into a degraded but completed turn.
#[derive(Debug, Error)]
pub enum HandoffError {
    /// Configuration errors (invalid TOML, missing required fields, bad credentials shape).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The webhook secret or signature did not match the tenant's configuration.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The tenant does not exist or has no credential for the requested channel.
    #[error("tenant {tenant_id} has no {channel} channel configured")]
    TenantNotConfigured { tenant_id: String, channel: String },

    /// The platform payload could not be decoded at all.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The enrichment provider exhausted its retries or timed out.
    #[error("enrichment unavailable: {message}")]
    EnrichmentUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Non-transient provider failure (auth failure, malformed response, schema mismatch).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No eligible agent exists for the tenant.
    #[error("no eligible agent available for tenant {tenant_id}")]
    AssignmentUnavailable { tenant_id: String },

    /// An outbound call to the chat platform or mail relay failed.
    #[error("downstream send failed: {message}")]
    DownstreamSend {
        message: String,
        /// HTTP status returned upstream, when the failure was a non-2xx response.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandoffError {
    /// Returns true for errors that must reject the webhook request instead of acknowledging it.
    pub fn is_request_rejection(&self) -> bool {
        matches!(
            self,
            HandoffError::Authentication(_) | HandoffError::TenantNotConfigured { .. }
        )
    }

    /// Short, stable label used in metrics and contact metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            HandoffError::Config(_) => "config",
            HandoffError::Storage { .. } => "storage",
            HandoffError::Authentication(_) => "authentication",
            HandoffError::TenantNotConfigured { .. } => "tenant_not_configured",
            HandoffError::MalformedPayload(_) => "malformed_payload",
            HandoffError::EnrichmentUnavailable { .. } => "enrichment_unavailable",
            HandoffError::Provider { .. } => "provider",
            HandoffError::AssignmentUnavailable { .. } => "assignment_unavailable",
            HandoffError::DownstreamSend { .. } => "downstream_send",
            HandoffError::Timeout { .. } => "timeout",
            HandoffError::Internal(_) => "internal",
        }
    }
}
