use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `draining` once shutdown has closed the dispatcher.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Compositing processes allowed at once.
    pub dispatch_capacity: usize,
    /// Compositing processes running right now.
    pub dispatch_in_use: usize,
}

/// GET /health -- returns service and dispatcher health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let dispatcher = &state.dispatcher;
    let status = if dispatcher.is_closed() { "draining" } else { "ok" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        dispatch_capacity: dispatcher.capacity(),
        dispatch_in_use: dispatcher.in_use(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
