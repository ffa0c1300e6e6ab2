//! # Health Check Handler

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::web::state::AppState;

/// Basic health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub tracked_tasks: usize,
}

/// Basic health check endpoint: GET /health
///
/// Returns OK while the process is serving. Broker connectivity is not
/// checked; a lost subscription terminates the exporter instead.
pub async fn basic_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        tracked_tasks: state.monitor.tracked_tasks(),
    })
}
