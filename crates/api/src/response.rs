//! Shared response types for API handlers.

use serde::Serialize;

/// Route prefix under which tokens are downloadable.
pub const TEMP_ROUTE_PREFIX: &str = "/temp/";

/// `{ "file": "/temp/<token>" }`, returned by upload and spin.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub file: String,
}

impl FileResponse {
    pub fn for_token(token: impl AsRef<str>) -> Self {
        Self {
            file: temp_url(token),
        }
    }
}

/// Public download path for a token.
pub fn temp_url(token: impl AsRef<str>) -> String {
    format!("{TEMP_ROUTE_PREFIX}{}", token.as_ref())
}
