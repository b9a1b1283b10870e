//! Observability infrastructure for the aggregator
//!
//! Provides:
//! - Prometheus instruments for the scrape-store-refresh pipeline
//! - Structured lifecycle logging with tracing
//!
//! All instruments are fire-and-forget: recording never blocks the pipeline,
//! and nothing in the pipeline waits for a consumer to read them.

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;
use tracing::info;

/// Histogram buckets for scrape and tick durations (in seconds). Scrapes are
/// network round-trips bounded by the per-node timeout, so the range is much
/// coarser than an in-process latency histogram.
const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AggregatorMetricsInner> = OnceLock::new();

struct AggregatorMetricsInner {
    scrape_duration_seconds: Histogram,
    tick_duration_seconds: Histogram,
    last_scrape_nodes: IntGauge,
    last_scrape_failures: IntGauge,
    scrape_errors_total: IntGauge,
    ticks_total: IntGauge,
    ticks_skipped_total: IntGauge,
    store_entities: IntGauge,
}

impl AggregatorMetricsInner {
    fn new() -> Self {
        Self {
            scrape_duration_seconds: register_histogram!(
                "metrics_aggregator_scrape_duration_seconds",
                "Time spent fetching one node's usage summary",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_duration_seconds"),

            tick_duration_seconds: register_histogram!(
                "metrics_aggregator_tick_duration_seconds",
                "Wall-clock time of one full scrape-and-store cycle",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),

            last_scrape_nodes: register_int_gauge!(
                "metrics_aggregator_last_scrape_nodes",
                "Nodes scraped successfully in the most recent cycle"
            )
            .expect("Failed to register last_scrape_nodes"),

            last_scrape_failures: register_int_gauge!(
                "metrics_aggregator_last_scrape_failures",
                "Nodes that failed in the most recent cycle"
            )
            .expect("Failed to register last_scrape_failures"),

            scrape_errors_total: register_int_gauge!(
                "metrics_aggregator_scrape_errors_total",
                "Total number of per-node scrape failures"
            )
            .expect("Failed to register scrape_errors_total"),

            ticks_total: register_int_gauge!(
                "metrics_aggregator_ticks_total",
                "Total number of completed refresh cycles"
            )
            .expect("Failed to register ticks_total"),

            ticks_skipped_total: register_int_gauge!(
                "metrics_aggregator_ticks_skipped_total",
                "Refresh cycles skipped because the previous cycle overran the resolution"
            )
            .expect("Failed to register ticks_skipped_total"),

            store_entities: register_int_gauge!(
                "metrics_aggregator_store_entities",
                "Entities currently held in the window store"
            )
            .expect("Failed to register store_entities"),
        }
    }
}

/// Aggregator metrics for Prometheus exposition.
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying instruments.
#[derive(Clone)]
pub struct AggregatorMetrics {
    _private: (),
}

impl Default for AggregatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AggregatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AggregatorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record how long one node's scrape took, success or failure
    pub fn observe_scrape_duration(&self, duration_secs: f64) {
        self.inner().scrape_duration_seconds.observe(duration_secs);
    }

    /// Record the wall-clock time of one refresh cycle
    pub fn observe_tick_duration(&self, duration_secs: f64) {
        self.inner().tick_duration_seconds.observe(duration_secs);
        self.inner().ticks_total.inc();
    }

    /// Record the per-cycle success/failure tally
    pub fn set_last_scrape(&self, scraped: i64, failed: i64) {
        self.inner().last_scrape_nodes.set(scraped);
        self.inner().last_scrape_failures.set(failed);
        if failed > 0 {
            self.inner().scrape_errors_total.add(failed);
        }
    }

    /// Count a refresh cycle that was skipped due to overrun
    pub fn inc_ticks_skipped(&self) {
        self.inner().ticks_skipped_total.inc();
    }

    /// Update the window store entity count
    pub fn set_store_entities(&self, count: i64) {
        self.inner().store_entities.set(count);
    }
}

/// Structured logger for aggregator lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, resolution_secs: u64, scrape_timeout_secs: u64) {
        info!(
            event = "aggregator_started",
            instance = %self.instance,
            version = %version,
            resolution_secs = resolution_secs,
            scrape_timeout_secs = scrape_timeout_secs,
            "Metrics aggregator started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "aggregator_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Metrics aggregator shutting down"
        );
    }
}
