//! Health and Metrics Routes

use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

use crate::AppState;

/// Liveness probe, always `200 ok`
pub async fn get_health() -> &'static str {
    "ok"
}

/// Prometheus text exposition, empty when no recorder is installed
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
