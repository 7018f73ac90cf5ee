use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health` answers 200 when storage responds, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.catalog.health_check().await {
        (
            StatusCode::OK,
            Json(json!({ "status": "ok", "backend": state.backend })),
        )
    } else {
        tracing::warn!(backend = state.backend, "Health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "backend": state.backend })),
        )
    }
}
