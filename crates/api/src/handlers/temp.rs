//! Handler for `GET /temp/{filename}`: downloads of uploads and results.

use std::sync::LazyLock;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::{HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use gifspin_core::token;
use regex::Regex;
use serde::Deserialize;
use tower_http::services::ServeFile;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Characters allowed verbatim in a download file name.
const UNSAFE_FILENAME_PATTERN: &str = r"[^a-zA-Z0-9.~_-]";

static UNSAFE_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(UNSAFE_FILENAME_PATTERN).expect("valid regex"));

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub attachment: Option<String>,
}

/// GET /temp/{filename}?attachment=<name>
///
/// Serves the file behind a token. With `attachment`, the response asks
/// the browser to save it under that (sanitized) name.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(params): Query<DownloadParams>,
    req: Request<Body>,
) -> AppResult<Response> {
    let path = token::resolve_path(&state.config.temp_dir, &filename);

    let mut response = ServeFile::new(path)
        .try_call(req)
        .await
        .map_err(|e| AppError::io("serve temp file", e))?
        .into_response();

    if let Some(name) = params.attachment.filter(|name| !name.is_empty()) {
        let value = format!("attachment; filename=\"{}\"", sanitize_filename(&name));
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(CONTENT_DISPOSITION, value);
        }
    }

    Ok(response)
}

/// Replace every character outside `[a-zA-Z0-9.~_-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_FILENAME_RE.replace_all(name, "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_safe_names() {
        assert_eq!(sanitize_filename("spin-01.gif"), "spin-01.gif");
        assert_eq!(sanitize_filename("~a_b.C"), "~a_b.C");
    }

    #[test]
    fn replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my cat\".gif"), "my_cat_.gif");
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("ñ.gif"), "_.gif");
    }
}
