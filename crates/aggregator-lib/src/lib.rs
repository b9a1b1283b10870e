//! Aggregation library for cluster resource metrics
//!
//! This crate provides the core scrape-store-refresh pipeline:
//! - Timeout-bounded usage collection from node agents
//! - Concurrent fan-out scraping across the node set
//! - A two-sample window store for instantaneous values and rates
//! - The periodic refresh coordinator with readiness gating
//! - Health checks and observability

pub mod coordinator;
pub mod health;
pub mod models;
pub mod nodes;
pub mod observability;
pub mod scraper;
pub mod storage;

pub use coordinator::{RefreshConfig, RefreshCoordinator};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use nodes::{NodeSource, StaticNodeSource};
pub use observability::{AggregatorMetrics, StructuredLogger};
pub use scraper::{NodeCollector, ScrapeBatch, ScrapeError, Scraper, SummaryClient};
pub use storage::WindowStore;
