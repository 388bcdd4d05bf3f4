//! Request handlers for the image API.
//!
//! Each submodule holds the handler functions for one endpoint. Handlers
//! take a [`RequestContext`](crate::middleware::context::RequestContext)
//! wherever they wait on the client or on a compositing slot, and map
//! failures via [`AppError`](crate::error::AppError).

pub mod fallback;
pub mod limits;
pub mod spin;
pub mod temp;
pub mod upload;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Token of the uploaded (or spin input) file.
pub const TOKEN_HEADER: HeaderName = HeaderName::from_static("x-spin-token");

/// Token of the file produced by a spin.
pub const TOKEN_OUTPUT_HEADER: HeaderName = HeaderName::from_static("x-spin-tokenoutput");

/// Build a header map from token values, skipping any that are not valid
/// header text.
pub(crate) fn token_headers<'a, I>(pairs: I) -> HeaderMap
where
    I: IntoIterator<Item = (HeaderName, &'a str)>,
{
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => tracing::debug!(header = %name, "Skipping token header with invalid value"),
        }
    }
    headers
}
