//! HTTP API gateway for AgentMesh.
//!
//! Exposes health checks plus the v1 API for discovery, routing,
//! delegation, sessions, and archived context.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use agentmesh_config::AppConfig;
use agentmesh_orchestrator::Coordinator;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub coordinator: Arc<Coordinator>,
}

pub type SharedState = Arc<GatewayState>;

/// Request bodies larger than this are rejected.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds the coordinator once, runs an initial discovery sweep, then serves
/// until the listener fails.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let coordinator = Arc::new(Coordinator::from_config(&config).await?);
    let found = coordinator.directory().discover().await;
    info!(agents = found.len(), "Initial discovery complete");

    let state = Arc::new(GatewayState {
        config,
        coordinator,
    });
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting with v1 API");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
