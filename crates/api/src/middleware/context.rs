//! Request-scoped [`Context`] extractor for Axum handlers.

use std::convert::Infallible;
use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use gifspin_core::context::Context;

use crate::state::AppState;

/// A child of the server's root context whose deadline is the configured
/// request timeout, measured from when the handler starts extracting.
///
/// Cancelled when dropped, i.e. when the handler returns or its future is
/// dropped because the client went away.
///
/// ```ignore
/// async fn my_handler(ctx: RequestContext) -> AppResult<Json<()>> {
///     state.dispatcher.submit(&ctx, &task).await?;
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug)]
pub struct RequestContext(Context);

impl Deref for RequestContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.0
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(state.root.with_timeout(state.config.request_timeout)))
    }
}
