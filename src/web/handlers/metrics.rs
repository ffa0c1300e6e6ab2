//! # Metrics Handler
//!
//! Prometheus text exposition of the exporter's registry.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::metrics::{encode_text, text_content_type};
use crate::web::state::AppState;

/// Scrape endpoint: GET /metrics
pub async fn scrape(State(state): State<AppState>) -> Response {
    match encode_text(&state.registry) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, text_content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to encode metrics: {e}"),
            )
                .into_response()
        }
    }
}
