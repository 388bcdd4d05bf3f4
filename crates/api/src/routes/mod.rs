pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /upload     POST   store an image, answer with its token
/// /spin       POST   composite an uploaded image (?file=<token>)
/// /limits     GET    active limits
/// ```
///
/// Unknown paths answer with a JSON 404 and known paths with the wrong
/// method with a JSON 405.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(handlers::upload::upload))
        .route("/spin", post(handlers::spin::spin))
        .route("/limits", get(handlers::limits::get_limits))
        .fallback(handlers::fallback::api_not_found)
        .method_not_allowed_fallback(handlers::fallback::api_method_not_allowed)
}

/// Build the download route for stored tokens.
pub fn temp_routes() -> Router<AppState> {
    Router::new().route("/temp/{filename}", get(handlers::temp::download))
}
