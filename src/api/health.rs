use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::api::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health.check_health().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "success": status.is_healthy(),
            "message": "Grundy checkout backend",
            "status": status.status,
            "checks": status.checks,
            "timestamp": status.timestamp,
        })),
    )
}

/// GET /health/live
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "alive"})))
}

/// GET /health/ready
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    if state.health.check_ready().await {
        (StatusCode::OK, Json(serde_json::json!({"status": "ready"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "not_ready"})),
        )
    }
}
