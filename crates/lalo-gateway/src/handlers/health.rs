//! Health and readiness check endpoints.
//!
//! `GET /health` - liveness probe (server is up)
//! `GET /ready`  - readiness probe (registry populated, can serve traffic)

use crate::state::LaloContext;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use axum::http::StatusCode;
use serde_json::json;

/// Always returns `200 OK` while the process is alive.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `200` once the Model Registry has at least one descriptor loaded,
/// `503` otherwise (an empty registry means nothing could ever be routed).
pub async fn ready(State(ctx): State<LaloContext>) -> impl IntoResponse {
    let model_count = ctx.registry.len();
    let status = if model_count > 0 { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if model_count > 0 { "ready" } else { "not_ready" },
            "models": model_count,
        })),
    )
}
