use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::credentials_from_headers;
use crate::state::AppState;
use crate::users::UserRowUpdate;

#[derive(Debug, Deserialize)]
pub struct UpdateUsersPayload {
    pub users: Vec<UserRowUpdate>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = credentials_from_headers(&headers);
    let users = state.chat.admin_list(&credentials)?;
    Ok(Json(json!({ "users": users })))
}

pub async fn update_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UpdateUsersPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = credentials_from_headers(&headers);
    let updated = state.chat.admin_update(&credentials, &payload.users)?;
    Ok(Json(json!({
        "status": "Admin changes saved.",
        "updated": updated
    })))
}
