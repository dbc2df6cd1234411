use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

pub const INVALID_CREDENTIALS: &str = "invalid email or password";
pub const INVALID_TOKEN: &str = "invalid or expired token";
pub const USER_NOT_FOUND: &str = "User not found";

/// Failure kinds surfaced by the gateway and the auth service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(&'static str),
    /// Deliberately coarse: the message never says which check failed.
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn already_exists(field: &str) -> Self {
        Self::Conflict(format!("User with this {field} already exists"))
    }

    pub fn user_not_found() -> Self {
        Self::NotFound(USER_NOT_FOUND)
    }

    pub fn invalid_credentials() -> Self {
        Self::Unauthorized(INVALID_CREDENTIALS)
    }

    pub fn invalid_token() -> Self {
        Self::Unauthorized(INVALID_TOKEN)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = json!({
            "success": false,
            "message": status.canonical_reason().unwrap_or("Error"),
            "error": message,
        });
        (status, Json(body)).into_response()
    }
}
