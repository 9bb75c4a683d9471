//! HTTP handlers for fiscal-service.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;
use crate::AppState;

pub mod clients;
pub mod invoices;
pub mod points_of_sale;
pub mod products;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = if state.db.health_check().await.is_ok() {
        "up"
    } else {
        "down"
    };
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "fiscal-service", "database": database })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        get_metrics(),
    )
}
