//! Aggregator configuration

use aggregator_lib::models::NodeRef;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Process configuration, loaded from `AGGREGATOR_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Instance name used in lifecycle log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Port for the read API, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Scrape period in seconds
    #[serde(default = "default_metric_resolution")]
    pub metric_resolution_secs: u64,

    /// Per-node scrape deadline in seconds; must not exceed the resolution
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,

    /// Node agent endpoints as `name=host:port` specs
    /// (comma-separated in `AGGREGATOR_NODES`)
    #[serde(default)]
    pub nodes: Vec<String>,

    /// URL scheme for agent endpoints
    #[serde(default = "default_agent_scheme")]
    pub agent_scheme: String,

    /// Accept agent certificates that fail verification
    #[serde(default)]
    pub insecure_tls: bool,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "metrics-aggregator".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_metric_resolution() -> u64 {
    15
}

fn default_scrape_timeout() -> u64 {
    10
}

fn default_agent_scheme() -> String {
    "https".to_string()
}

impl AggregatorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("AGGREGATOR")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("nodes"),
            )
            .build()?;

        config
            .try_deserialize()
            .context("Invalid aggregator configuration")
    }

    pub fn metric_resolution(&self) -> Duration {
        Duration::from_secs(self.metric_resolution_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    /// Parse the configured node specs. A spec without an explicit name
    /// uses its host as the node name.
    pub fn node_refs(&self) -> Result<Vec<NodeRef>> {
        self.nodes.iter().map(|spec| parse_node_spec(spec)).collect()
    }
}

fn parse_node_spec(spec: &str) -> Result<NodeRef> {
    let (name, endpoint) = match spec.split_once('=') {
        Some((name, endpoint)) => (name, endpoint),
        None => {
            let host = spec.rsplit_once(':').map(|(host, _)| host).unwrap_or(spec);
            (host, spec)
        }
    };

    let (host, port) = endpoint
        .rsplit_once(':')
        .with_context(|| format!("node spec '{}' is missing a port", spec))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("node spec '{}' has an invalid port", spec))?;

    if name.is_empty() || host.is_empty() {
        bail!("node spec '{}' is missing a name or host", spec);
    }

    Ok(NodeRef::new(name, host, port))
}
