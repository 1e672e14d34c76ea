use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown user.")]
    UnknownUser,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("Your access has been deactivated by admin. Please contact support.")]
    AccountDeactivated,
    #[error("This account is not allowed to access {0}. Please contact support.")]
    WrongRole(&'static str),
    #[error("Token limit exceeded. Please contact admin to upgrade your plan.")]
    TokenBudgetExceeded,
    #[error("Remote service error: {0}")]
    RemoteService(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownUser | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::AccountDeactivated | ApiError::WrongRole(_) => StatusCode::FORBIDDEN,
            ApiError::TokenBudgetExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RemoteService(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
