//! Periodic refresh coordination
//!
//! One sequential driver owns the scrape-and-store cadence for the process
//! lifetime: wait for the node source's initial sync, then once per
//! resolution take a fresh node snapshot, fan out the scrape, commit the
//! batch and sweep. A cycle that overruns the resolution causes the next
//! tick to be skipped, never overlapped or queued.

use crate::health::{components, HealthRegistry};
use crate::nodes::NodeSource;
use crate::observability::AggregatorMetrics;
use crate::scraper::Scraper;
use crate::storage::{WindowStore, RETENTION_TICKS};
use anyhow::{ensure, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How often the coordinator re-checks the node source's sync signal
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Timing configuration for the refresh loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    resolution: Duration,
    scrape_timeout: Duration,
}

impl RefreshConfig {
    /// A scrape timeout longer than the resolution would let one cycle's
    /// slowest node push work into the next cycle, so such configurations
    /// are rejected here rather than tolerated at runtime.
    pub fn new(resolution: Duration, scrape_timeout: Duration) -> Result<Self> {
        ensure!(!resolution.is_zero(), "metric resolution must be positive");
        ensure!(!scrape_timeout.is_zero(), "scrape timeout must be positive");
        ensure!(
            scrape_timeout <= resolution,
            "scrape timeout ({:?}) must not exceed the metric resolution ({:?})",
            scrape_timeout,
            resolution
        );
        Ok(Self {
            resolution,
            scrape_timeout,
        })
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    pub fn scrape_timeout(&self) -> Duration {
        self.scrape_timeout
    }

    /// Retention bound for the window store: an entity that goes
    /// unrefreshed for this long is evicted by the per-tick sweep.
    pub fn retention(&self) -> Duration {
        self.resolution * RETENTION_TICKS
    }
}

/// Drives the scrape-store-refresh cycle for the process lifetime.
pub struct RefreshCoordinator {
    nodes: Arc<dyn NodeSource>,
    scraper: Scraper,
    store: Arc<WindowStore>,
    config: RefreshConfig,
    health: HealthRegistry,
    metrics: AggregatorMetrics,
}

impl RefreshCoordinator {
    pub fn new(
        nodes: Arc<dyn NodeSource>,
        scraper: Scraper,
        store: Arc<WindowStore>,
        config: RefreshConfig,
        health: HealthRegistry,
    ) -> Self {
        Self {
            nodes,
            scraper,
            store,
            config,
            health,
            metrics: AggregatorMetrics::new(),
        }
    }

    /// Run the refresh loop until shutdown. Readiness stays false until the
    /// node source reports its initial sync; the first cycle starts
    /// immediately after.
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!("Waiting for the node source's initial sync");
        while !self.nodes.has_synced() {
            tokio::select! {
                _ = tokio::time::sleep(SYNC_POLL_INTERVAL) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down before node source sync");
                    return;
                }
            }
        }

        self.health.set_ready(true).await;
        info!(
            resolution_secs = self.config.resolution.as_secs(),
            scrape_timeout_secs = self.config.scrape_timeout.as_secs(),
            "Node source synced, starting refresh loop"
        );

        let mut ticker = interval(self.config.resolution);
        // An overrunning cycle must skip the ticks it missed, not replay
        // them back-to-back.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down refresh loop");
                    break;
                }
            }
        }
    }

    /// One scrape-and-store cycle. Every node result is joined before the
    /// store is touched, and nothing in here can end the loop.
    async fn tick(&self) {
        let start = Instant::now();

        let nodes = self.nodes.list_nodes().await;
        let node_count = nodes.len();
        let batch = self.scraper.scrape(nodes).await;

        let now = Utc::now();
        let failed = batch.errors.len();
        let sample_count = batch.samples.len();
        self.store.update(batch.samples, now);
        self.store.sweep(now);

        let elapsed = start.elapsed();
        self.metrics.observe_tick_duration(elapsed.as_secs_f64());
        self.metrics.set_store_entities(self.store.len() as i64);

        if node_count > 0 && failed == node_count {
            // Existing windows keep serving stale data; flag the condition
            // without dropping readiness.
            self.health
                .set_degraded(components::SCRAPER, "All nodes failed to scrape")
                .await;
        } else {
            self.health.set_healthy(components::SCRAPER).await;
        }

        if elapsed > self.config.resolution {
            self.metrics.inc_ticks_skipped();
            warn!(
                tick_ms = elapsed.as_millis(),
                resolution_ms = self.config.resolution.as_millis(),
                "Refresh cycle overran the metric resolution; skipping missed ticks"
            );
        }

        debug!(
            nodes = node_count,
            failed = failed,
            samples = sample_count,
            entities = self.store.len(),
            elapsed_ms = elapsed.as_millis(),
            "Refresh cycle complete"
        );
    }
}
