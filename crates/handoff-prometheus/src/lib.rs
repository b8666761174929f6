// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics recorder for the Handoff engine.
//!
//! Installs the metrics-rs Prometheus exporter as the global recorder. The
//! rendered text is served by the gateway's `/metrics` endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use handoff_core::HandoffError;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::types::{AdapterType, HealthStatus};

pub use recording::register_metrics;

/// Owns the handle of the installed Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn install() -> Result<Self, HandoffError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            HandoffError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wraps an existing handle, e.g. from a locally built recorder.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}
