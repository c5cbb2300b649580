// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordinator Bootstrap
//!
//! Wires a validated [`CoordinatorConfigManifest`] into a running
//! [`Coordinator`]: PostgreSQL pool and repositories, the admin notifier,
//! the Prometheus exporter and a Ctrl-C handler.
//!
//! The transport is supplied by the embedder; this crate ships none.
//!
//! ```ignore
//! let config = CoordinatorConfigManifest::load_or_default(None)?;
//! let exits = chorus_cli::bootstrap::run_coordinator(config, Arc::new(MyConnector::new())).await?;
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use chorus_core::application::{Coordinator, CoordinatorPorts, CoordinatorSettings};
use chorus_core::domain::agent::{AgentExit, AgentId};
use chorus_core::domain::coordinator_config::CoordinatorConfigManifest;
use chorus_core::domain::notifier::AdminNotifier;
use chorus_core::domain::transport::TransportConnector;
use chorus_core::infrastructure::db::Database;
use chorus_core::infrastructure::repositories::{
    PostgresAgentRepository, PostgresRestrictionRepository, PostgresTopicRepository,
};
use chorus_core::infrastructure::{HttpBotNotifier, LogNotifier};

/// Connect to the store described by `config`.
pub async fn connect_database(config: &CoordinatorConfigManifest) -> Result<Database> {
    let url = config.database_url().context("Database URL is not available")?;
    Database::new(&url, config.spec.database.max_connections)
        .await
        .context("Failed to connect to database")
}

/// HTTP bot notifier when configured, log notifier otherwise.
pub fn build_notifier(config: &CoordinatorConfigManifest) -> Result<Arc<dyn AdminNotifier>> {
    match &config.spec.notifications {
        Some(notifications) => {
            let notifier = HttpBotNotifier::from_config(notifications)
                .context("Failed to configure admin notifications")?;
            Ok(Arc::new(notifier))
        }
        None => {
            info!("No notification endpoint configured, admin notifications go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Start the Prometheus listener when metrics are enabled.
pub fn install_metrics(config: &CoordinatorConfigManifest) -> Result<()> {
    let Some(metrics) = config
        .spec
        .observability
        .as_ref()
        .and_then(|o| o.metrics.as_ref())
        .filter(|m| m.enabled)
    else {
        return Ok(());
    };

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics.port))
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(port = metrics.port, "Prometheus metrics exporter listening");
    Ok(())
}

/// Run the coordinator until every agent has ended or Ctrl-C is received.
pub async fn run_coordinator(
    config: CoordinatorConfigManifest,
    connector: Arc<dyn TransportConnector>,
) -> Result<Vec<(AgentId, AgentExit)>> {
    config.validate().context("Configuration validation failed")?;
    install_metrics(&config)?;

    let database = connect_database(&config).await?;
    let pool = database.get_pool().clone();

    let ports = CoordinatorPorts {
        agents: Arc::new(PostgresAgentRepository::new(pool.clone())),
        topics: Arc::new(PostgresTopicRepository::new(pool.clone())),
        restrictions: Arc::new(PostgresRestrictionRepository::new(pool)),
        connector,
        notifier: build_notifier(&config)?,
    };
    let settings = CoordinatorSettings::from_spec(&config.spec)?;
    let coordinator = Coordinator::new(ports, settings);

    let shutdown = coordinator.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping agents");
            shutdown.cancel();
        }
    });

    info!(name = %config.metadata.name, "Starting coordinator");
    coordinator.run().await
}
