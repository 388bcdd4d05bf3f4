use axum::http::StatusCode;

use crate::error::AppError;

/// Unmatched path under `/api`.
pub async fn api_not_found() -> AppError {
    AppError::from_status(StatusCode::NOT_FOUND)
}

/// Matched `/api` path with an unsupported method.
pub async fn api_method_not_allowed() -> AppError {
    AppError::from_status(StatusCode::METHOD_NOT_ALLOWED)
}
