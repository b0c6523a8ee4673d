use axum::extract::State;

use crate::app::AppState;
use crate::database::bible;
use crate::database::models::{Bible, RecentUpdate};
use crate::middleware::{ApiResponse, ApiResult};

/// GET /bible/bible - every book with its chapters and verses, in order
pub async fn bible_get(State(state): State<AppState>) -> ApiResult<Bible> {
    let bible = bible::load(state.db.pool(), &state.config.api.bible_version).await?;
    Ok(ApiResponse::ok("Bible data fetched", bible))
}

/// GET /bible/update - whether anything changed inside the recent-update window
pub async fn update_get(State(state): State<AppState>) -> ApiResult<RecentUpdate> {
    let update = bible::recent_update(state.db.pool(), state.config.api.recent_update_window_secs).await?;
    Ok(ApiResponse::ok("Bible data was recently updated", update))
}
