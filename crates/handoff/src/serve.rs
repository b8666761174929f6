// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `handoff serve` command implementation.
//!
//! Opens storage, builds the channel adapters and the enrichment and ticket
//! collaborators, and serves the webhook gateway until SIGTERM or Ctrl+C.

use std::sync::Arc;

use tracing::{info, warn};

use handoff_config::HandoffConfig;
use handoff_core::traits::adapter::PluginAdapter;
use handoff_core::traits::enrichment::Enricher;
use handoff_core::traits::notifier::TicketNotifier;
use handoff_core::{HandoffError, StorageAdapter};
use handoff_email::{LogOnlyNotifier, SmtpTicketNotifier};
use handoff_enrichment::{DisabledEnricher, EnrichmentClient};
use handoff_gateway::{GatewayState, HealthState, start_server};
use handoff_prometheus::PrometheusAdapter;
use handoff_routing::{Router, RoutingSettings};
use handoff_storage::SqliteStorage;
use handoff_telegram::TelegramChannel;
use handoff_whatsapp::WhatsAppChannel;

use crate::shutdown;

type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

fn build_enricher(config: &HandoffConfig) -> Result<Arc<dyn Enricher>, HandoffError> {
    Ok(match EnrichmentClient::from_config(&config.enrichment)? {
        Some(client) => {
            info!(provider = client.name(), "enrichment provider configured");
            Arc::new(client)
        }
        None => {
            warn!("no enrichment provider key configured, every message takes the fallback path");
            Arc::new(DisabledEnricher)
        }
    })
}

fn build_notifier(config: &HandoffConfig) -> Result<Arc<dyn TicketNotifier>, HandoffError> {
    Ok(match SmtpTicketNotifier::from_config(&config.email)? {
        Some(notifier) => {
            info!("smtp ticket notifier configured");
            Arc::new(notifier)
        }
        None => {
            warn!("no smtp relay configured, support tickets will only be logged");
            Arc::new(LogOnlyNotifier)
        }
    })
}

fn build_metrics(config: &HandoffConfig) -> Result<Option<MetricsRender>, HandoffError> {
    if !config.prometheus.enabled {
        return Ok(None);
    }
    let adapter = PrometheusAdapter::install()?;
    Ok(Some(Arc::new(move || adapter.render())))
}

/// Runs the `handoff serve` command.
pub async fn run_serve(config: HandoffConfig) -> Result<(), HandoffError> {
    init_tracing(&config.service.log_level);

    info!(name = %config.service.name, "starting handoff serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let prometheus_render = build_metrics(&config)?;
    let enricher = build_enricher(&config)?;
    let notifier = build_notifier(&config)?;

    let router = Router::new(
        storage.clone(),
        enricher,
        notifier,
        RoutingSettings::from_config(&config),
    )
    .with_channel(Arc::new(TelegramChannel::new(&config.telegram)?))
    .with_channel(Arc::new(WhatsAppChannel::new(&config.whatsapp)?));

    let cancel = shutdown::install_signal_handler();

    let state = GatewayState {
        router: Arc::new(router),
        health: HealthState::new(prometheus_render),
    };
    start_server(&config.server, state, cancel.cancelled_owned()).await?;

    storage.close().await?;
    info!("handoff serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber; `RUST_LOG` takes precedence.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("handoff={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
