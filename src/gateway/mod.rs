//! HTTP gateway
//!
//! `POST /rpc` carries the merchant JSON-RPC API; `GET /api/v1/health` is for probes.

pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the gateway router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rpc", post(handlers::handle_rpc))
        .route("/api/v1/health", get(handlers::health_check))
        .with_state(state)
}

/// Bind and serve until the listener fails
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!("Failed to bind to {}: {}", addr, e);
        e
    })?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("  POST /rpc");
    tracing::info!("  GET  /api/v1/health");

    axum::serve(listener, app).await
}
