use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();
    Json(json!({
        "status": "ok",
        "model": state.settings.chat.model,
        "window_policy": state.chat.policy(),
        "uptime_seconds": uptime
    }))
}
