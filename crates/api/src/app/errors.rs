use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use tenantry_tenancy::Rejection;

/// Every failure an HTTP handler can return.
///
/// Authentication failures collapse to one generic 401 body; the internal
/// reason has already been logged by the resolution chain.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("token not valid for this tenant")]
    TenantMismatch,

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Unauthorized(_) => ApiError::Unauthorized,
            Rejection::TenantMismatch => ApiError::TenantMismatch,
            Rejection::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": "Unauthorized" }))).into_response()
            }
            ApiError::TenantMismatch => json_error(
                StatusCode::FORBIDDEN,
                "Forbidden",
                "Token not valid for this tenant",
            ),
            ApiError::InvalidBody(msg) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
