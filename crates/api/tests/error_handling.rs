//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no router is
//! involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use gifspin_api::error::{AppError, ERROR_HEADER};
use gifspin_core::context::ContextError;
use gifspin_core::error::SpinError;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status, error header and parsed
/// JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, String, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let header = response.headers()[ERROR_HEADER].to_str().unwrap().to_string();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, header, json)
}

// ---------------------------------------------------------------------------
// Test: Deadline maps to 504 with the context message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deadline_returns_504() {
    let err = AppError::from(SpinError::Context(ContextError::DeadlineExceeded));

    let (status, header, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["err"], "context deadline exceeded");
    assert_eq!(header, "context deadline exceeded");
}

// ---------------------------------------------------------------------------
// Test: Malformed JSON maps to 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_json_returns_400() {
    let err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();

    let (status, _, json) = error_to_response(AppError::from(err)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["err"].as_str().unwrap().starts_with("invalid json: "));
}

// ---------------------------------------------------------------------------
// Test: A plain failure maps to 500 and keeps its message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plain_failure_returns_500_with_message() {
    let err = AppError::io("write upload file", std::io::Error::other("no space left"));

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["err"], "write upload file: no space left");
}

// ---------------------------------------------------------------------------
// Test: Multi-line messages are escaped in the header but not the body
// ---------------------------------------------------------------------------

#[tokio::test]
async fn header_is_escaped_body_is_not() {
    let err = AppError::bad_request("first line\nsecond line");

    let (status, header, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(header, "first line?second line");
    assert_eq!(json["err"], "first line\nsecond line");
}
