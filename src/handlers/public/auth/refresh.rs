use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use super::{refresh_cookie, REFRESH_COOKIE};
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshData {
    pub access_token: String,
}

/// POST /auth/refresh - trade the refresh cookie for a new token pair
pub async fn refresh_post(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<RefreshData>), ApiError> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request("Refresh token is required"))?;

    let tokens = state.auth.refresh_token(&refresh_token).await?;

    let jar = jar.add(refresh_cookie(state.auth.tokens(), tokens.refresh_token));
    let data = RefreshData {
        access_token: tokens.access_token,
    };
    Ok((jar, ApiResponse::ok("Token refreshed successfully", data)))
}
