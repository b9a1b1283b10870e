//! Metrics aggregator - cluster-wide resource usage aggregation
//!
//! Scrapes every node agent on a fixed resolution, keeps a short in-memory
//! window of samples per entity, and serves near-real-time usage values and
//! rates over a read API.

use aggregator_lib::{
    coordinator::{RefreshConfig, RefreshCoordinator},
    health::{components, HealthRegistry},
    nodes::StaticNodeSource,
    observability::StructuredLogger,
    scraper::{AgentClientConfig, Scraper, SummaryClient},
    storage::WindowStore,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGGREGATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting metrics-aggregator");

    // Load and validate configuration
    let config = config::AggregatorConfig::load()?;
    let refresh = RefreshConfig::new(config.metric_resolution(), config.scrape_timeout())?;
    let nodes = config.node_refs()?;
    info!(
        nodes = nodes.len(),
        api_port = config.api_port,
        resolution_secs = config.metric_resolution_secs,
        "Aggregator configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::NODE_SOURCE).await;
    health_registry.register(components::SCRAPER).await;
    health_registry.register(components::STORAGE).await;

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(
        AGGREGATOR_VERSION,
        config.metric_resolution_secs,
        config.scrape_timeout_secs,
    );

    // Wire the pipeline: node source -> collector -> scraper -> store
    let source = Arc::new(StaticNodeSource::new(nodes));
    let collector = Arc::new(SummaryClient::new(AgentClientConfig {
        scheme: config.agent_scheme.clone(),
        insecure_tls: config.insecure_tls,
        ..Default::default()
    })?);
    let scraper = Scraper::new(collector, refresh.scrape_timeout());
    let store = Arc::new(WindowStore::new(refresh.retention()));

    let coordinator = RefreshCoordinator::new(
        source,
        scraper,
        Arc::clone(&store),
        refresh,
        health_registry.clone(),
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let coordinator_handle = tokio::spawn(coordinator.run(shutdown_tx.subscribe()));

    // Start the read API and health server
    let app_state = Arc::new(api::AppState::new(store, health_registry.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    let _ = coordinator_handle.await;
    api_handle.abort();

    Ok(())
}
