//! HTTP read API, health checks and Prometheus exposition
//!
//! The read API is a thin pass-through over the window store: bulk entity
//! listing plus per-entity latest/rate lookups. Nothing here blocks beyond
//! the store's lock duration.

use aggregator_lib::{
    health::{ComponentStatus, HealthRegistry},
    models::{EntityKey, Sample, UsageRate},
    storage::WindowStore,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<WindowStore>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(store: Arc<WindowStore>, health_registry: HealthRegistry) -> Self {
        Self {
            store,
            health_registry,
        }
    }
}

/// Latest sample plus derived rate for one entity. The rate is absent while
/// the entity is cold-starting or its window is unusable.
#[derive(Debug, Serialize)]
pub struct EntityUsage {
    pub latest: Sample,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<UsageRate>,
}

/// Health check response - returns 200 if healthy/degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Bulk listing of every entity currently in the store
async fn list_entities(State(state): State<Arc<AppState>>) -> Json<Vec<EntityKey>> {
    Json(state.store.entities())
}

async fn node_usage(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    entity_usage(&state, EntityKey::node(name))
}

async fn container_usage(
    State(state): State<Arc<AppState>>,
    Path((namespace, pod, container)): Path<(String, String, String)>,
) -> Response {
    entity_usage(&state, EntityKey::container(namespace, pod, container))
}

fn entity_usage(state: &AppState, key: EntityKey) -> Response {
    match state.store.latest(&key) {
        Some(latest) => {
            let rate = state.store.rate(&key);
            (StatusCode::OK, Json(EntityUsage { latest, rate })).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/entities", get(list_entities))
        .route("/api/v1/nodes/:name", get(node_usage))
        .route(
            "/api/v1/namespaces/:namespace/pods/:pod/containers/:container",
            get(container_usage),
        )
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
