//! Concurrent scraping of node agents
//!
//! The fan-out scraper runs one timeout-bounded collection per node and
//! joins all of them before returning. A slow or failed node delays only
//! its own contribution; the aggregate result carries every success and a
//! failure record per unreachable node.

mod client;
mod summary;


pub use client::{AgentClientConfig, SummaryClient};
pub use summary::{ContainerStats, CpuStats, MemoryStats, NodeStats, PodReference, PodStats, Summary};

use crate::models::{NodeRef, Sample};
use crate::observability::AggregatorMetrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Trait for per-node usage collection implementations.
#[async_trait]
pub trait NodeCollector: Send + Sync {
    /// Fetch one usage snapshot from a node's agent, returning within
    /// `deadline` one way or the other.
    async fn collect(&self, node: &NodeRef, deadline: Duration) -> Result<Vec<Sample>, ScrapeError>;
}

/// One node's failure during a scrape cycle. Network faults, bad responses,
/// malformed payloads and timeouts all collapse into this one error kind
/// with the node identity attached.
#[derive(Debug, Clone, Error)]
#[error("node {node} unreachable or unparsable after {elapsed_ms}ms: {kind}")]
pub struct ScrapeError {
    pub node: String,
    pub kind: ScrapeErrorKind,
    pub elapsed_ms: u64,
}

impl ScrapeError {
    pub fn new(node: &str, kind: ScrapeErrorKind, elapsed: Duration) -> Self {
        Self {
            node: node.to_string(),
            kind,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ScrapeErrorKind {
    #[error("request failed: {0}")]
    Request(String),
    #[error("agent returned HTTP {0}")]
    Status(u16),
    #[error("malformed summary payload: {0}")]
    Malformed(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Aggregate outcome of one fan-out across the node set. Consumed by the
/// window store update and discarded at the end of the tick.
#[derive(Debug, Default)]
pub struct ScrapeBatch {
    pub samples: Vec<Sample>,
    pub errors: Vec<ScrapeError>,
}

/// Fan-out scraper: one concurrent collector invocation per node.
pub struct Scraper {
    collector: Arc<dyn NodeCollector>,
    per_node_timeout: Duration,
    metrics: AggregatorMetrics,
}

impl Scraper {
    pub fn new(collector: Arc<dyn NodeCollector>, per_node_timeout: Duration) -> Self {
        Self {
            collector,
            per_node_timeout,
            metrics: AggregatorMetrics::new(),
        }
    }

    /// Scrape every node concurrently and wait for all of them. Individual
    /// failures are aggregated, never propagated; the call itself cannot
    /// fail.
    pub async fn scrape(&self, nodes: Vec<NodeRef>) -> ScrapeBatch {
        let fanout_start = Instant::now();
        let node_count = nodes.len();
        let mut tasks: JoinSet<(NodeRef, Duration, Result<Vec<Sample>, ScrapeError>)> =
            JoinSet::new();

        for node in nodes {
            let collector = Arc::clone(&self.collector);
            let deadline = self.per_node_timeout;
            tasks.spawn(async move {
                let start = Instant::now();
                // The collector is expected to honor the deadline itself;
                // the outer timeout guarantees the bound even if it doesn't.
                let result = match tokio::time::timeout(deadline, collector.collect(&node, deadline))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ScrapeError::new(
                        &node.name,
                        ScrapeErrorKind::DeadlineExceeded,
                        start.elapsed(),
                    )),
                };
                (node, start.elapsed(), result)
            });
        }

        let mut batch = ScrapeBatch::default();
        let mut scraped = 0i64;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((node, elapsed, Ok(samples))) => {
                    self.metrics.observe_scrape_duration(elapsed.as_secs_f64());
                    debug!(
                        node = %node.name,
                        samples = samples.len(),
                        elapsed_ms = elapsed.as_millis(),
                        "Node scraped"
                    );
                    scraped += 1;
                    batch.samples.extend(samples);
                }
                Ok((node, elapsed, Err(error))) => {
                    self.metrics.observe_scrape_duration(elapsed.as_secs_f64());
                    warn!(node = %node.name, error = %error, "Failed to scrape node");
                    batch.errors.push(error);
                }
                Err(join_error) => {
                    // A panicking collector must not take the cycle down
                    // with it.
                    warn!(error = %join_error, "Scrape task failed to join");
                }
            }
        }

        self.metrics
            .set_last_scrape(scraped, batch.errors.len() as i64);
        debug!(
            nodes = node_count,
            scraped = scraped,
            failed = batch.errors.len(),
            elapsed_ms = fanout_start.elapsed().as_millis(),
            "Scrape cycle complete"
        );

        batch
    }
}
