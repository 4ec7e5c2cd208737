use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;
use service::AppState;

/// GET liveness plus a snapshot of how many clients are connected.
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let registry = &app_state.registry;
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "time": Utc::now().to_rfc3339(),
            "connections": registry.connection_count().await,
            "users": registry.user_count().await,
        })),
    )
}
