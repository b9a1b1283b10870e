//! HTTP collector for node agent summaries
//!
//! One GET per node per cycle against the agent's summary endpoint. The
//! caller's deadline bounds the whole exchange (connect, response, body);
//! on expiry the in-flight request is dropped and a timeout error is
//! returned for that node alone.

use super::{NodeCollector, ScrapeError, ScrapeErrorKind};
use crate::models::{NodeRef, Sample};
use crate::scraper::summary::Summary;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use url::Url;

/// Configuration for talking to node agents.
#[derive(Debug, Clone)]
pub struct AgentClientConfig {
    /// URL scheme for agent endpoints ("https" or "http")
    pub scheme: String,
    /// Accept agent certificates that fail verification (self-signed
    /// kubelet-style serving certs)
    pub insecure_tls: bool,
    /// TCP connect timeout, independent of the per-scrape deadline
    pub connect_timeout: Duration,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            insecure_tls: false,
            connect_timeout: Duration::from_secs(2),
        }
    }
}

/// Collector that fetches the summary document over HTTP(S).
pub struct SummaryClient {
    client: reqwest::Client,
    scheme: String,
}

impl SummaryClient {
    pub fn new(config: AgentClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(config.insecure_tls)
            .build()
            .context("Failed to create agent HTTP client")?;

        Ok(Self {
            client,
            scheme: config.scheme,
        })
    }

    fn summary_url(&self, node: &NodeRef) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}://{}:{}/stats/summary",
            self.scheme, node.address, node.port
        ))
    }
}

#[async_trait]
impl NodeCollector for SummaryClient {
    async fn collect(&self, node: &NodeRef, deadline: Duration) -> Result<Vec<Sample>, ScrapeError> {
        let start = Instant::now();

        let url = self
            .summary_url(node)
            .map_err(|e| ScrapeError::new(&node.name, ScrapeErrorKind::Request(e.to_string()), start.elapsed()))?;

        let response = self
            .client
            .get(url)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    ScrapeErrorKind::DeadlineExceeded
                } else {
                    ScrapeErrorKind::Request(e.to_string())
                };
                ScrapeError::new(&node.name, kind, start.elapsed())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::new(
                &node.name,
                ScrapeErrorKind::Status(status.as_u16()),
                start.elapsed(),
            ));
        }

        let summary: Summary = response.json().await.map_err(|e| {
            let kind = if e.is_timeout() {
                ScrapeErrorKind::DeadlineExceeded
            } else {
                ScrapeErrorKind::Malformed(e.to_string())
            };
            ScrapeError::new(&node.name, kind, start.elapsed())
        })?;

        Ok(summary.into_samples(node))
    }
}
