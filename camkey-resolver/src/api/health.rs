//! Health check endpoint

use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Lookups queued or in progress
    pub queue_depth: usize,
    pub getsongbpm_configured: bool,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "camkey-resolver".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        queue_depth: state.queue.depth(),
        getsongbpm_configured: state.api_key.get().await.is_some(),
    })
}

/// Build health routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
