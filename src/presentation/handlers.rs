// HTTP request handlers
use crate::infrastructure::prometheus_text;
use crate::presentation::app_state::AppState;
use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current gauge values in Prometheus text format
pub async fn scrape_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = prometheus_text::render(&state.metrics.snapshot());
    ([(header::CONTENT_TYPE, prometheus_text::CONTENT_TYPE)], body)
}
