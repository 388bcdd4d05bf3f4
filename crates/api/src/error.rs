use std::error::Error as StdError;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use gifspin_core::context::ContextError;
use gifspin_core::error::SpinError;
use http_body_util::LengthLimitError;
use serde_json::json;

/// Diagnostic header mirroring the JSON error message.
pub const ERROR_HEADER: HeaderName = HeaderName::from_static("x-spin-error");

/// Longest message reflected into [`ERROR_HEADER`].
const MAX_HEADER_MESSAGE_LEN: usize = 512;

/// Application-level error type for HTTP handlers.
///
/// Every failure a request can run into ends up here, and
/// [`AppError::classify`] turns it into a stable `(status, message)` pair.
/// Implements [`IntoResponse`] to produce `{"err": message}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An error that already knows its HTTP status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// A failure from the compositing core.
    #[error(transparent)]
    Spin(#[from] SpinError),

    /// The request context finished while reading or waiting.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The request body was not valid JSON for the expected type.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// The body-limiting layer refused more bytes.
    #[error("request body too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: u64 },

    /// Reading the request body failed.
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    /// A filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// An error with an explicit status and message.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    /// An error carrying only a status; its message is the canonical
    /// reason phrase.
    pub fn from_status(status: StatusCode) -> Self {
        Self::status(status, String::new())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(StatusCode::NOT_FOUND, message)
    }

    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Classify a body-read failure, recognising the length limit
    /// structurally rather than by message.
    pub fn from_body_error(err: axum::Error, limit: u64) -> Self {
        if is_length_limit(&err) {
            Self::PayloadTooLarge { limit }
        } else {
            Self::Body(err)
        }
    }

    /// Map this error to the status and message sent to the client.
    ///
    /// - an explicit status passes through (out-of-range becomes 500);
    /// - caller cancellation is 500, an expired deadline is 504;
    /// - malformed JSON and option violations are 400;
    /// - an oversized body is 413;
    /// - a closed dispatcher is 503;
    /// - everything else is 500.
    ///
    /// The message is never empty.
    pub fn classify(&self) -> (StatusCode, String) {
        let status = match self {
            Self::Status { status, .. } => valid_status(*status),
            Self::Spin(SpinError::Context(reason)) | Self::Context(reason) => match reason {
                ContextError::Canceled => StatusCode::INTERNAL_SERVER_ERROR,
                ContextError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            },
            Self::Spin(SpinError::Limits(_)) => StatusCode::BAD_REQUEST,
            Self::Spin(SpinError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Spin(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Body(_) | Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut message = self.to_string();
        if message.is_empty() {
            message = status.canonical_reason().unwrap_or("undefined").to_string();
        }

        (status, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.classify();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let mut response = (status, axum::Json(json!({ "err": message }))).into_response();
        response
            .headers_mut()
            .insert(ERROR_HEADER, header_safe(&message));
        response
    }
}

fn valid_status(status: u16) -> StatusCode {
    match StatusCode::from_u16(status) {
        Ok(code) if (100..=599).contains(&status) => code,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn is_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Escape `message` into a header value: visible ASCII only, truncated.
fn header_safe(message: &str) -> HeaderValue {
    let escaped: String = message
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .take(MAX_HEADER_MESSAGE_LEN)
        .collect();
    HeaderValue::from_str(&escaped).unwrap_or_else(|_| HeaderValue::from_static("error"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
