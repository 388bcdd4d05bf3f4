use axum::extract::State;
use axum::Json;
use gifspin_core::options::CompositeLimits;

use crate::state::AppState;

/// GET /api/limits
///
/// The active limits, so clients can constrain their inputs up front.
pub async fn get_limits(State(state): State<AppState>) -> Json<CompositeLimits> {
    Json(state.config.limits)
}
