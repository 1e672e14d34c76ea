use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::chat::LoginOutcome;
use crate::core::errors::ApiError;
use crate::core::security::credentials_from_headers;
use crate::state::AppState;

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = credentials_from_headers(&headers);
    let body = match state.chat.login(&credentials).await? {
        LoginOutcome::User { history } => json!({
            "role": "user",
            "status": "Login successful.",
            "history": history
        }),
        LoginOutcome::Admin { users } => json!({
            "role": "admin",
            "status": "Admin login successful.",
            "users": users
        }),
    };
    Ok(Json(body))
}
