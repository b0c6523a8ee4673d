use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use super::refresh_cookie;
use crate::api::validation::{self, CredentialsBody};
use crate::app::AppState;
use crate::database::models::AdminUser;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(flatten)]
    pub admin: AdminUser,
    pub access_token: String,
}

/// POST /auth/login - returns the admin plus an access token and sets the
/// refresh token cookie. Bad usernames and bad passwords look the same.
pub async fn login_post(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<CredentialsBody>,
) -> Result<(CookieJar, ApiResponse<LoginData>), ApiError> {
    let credentials = validation::credentials(body)?;
    let result = state.auth.login(&credentials.username, &credentials.password).await?;

    let jar = jar.add(refresh_cookie(state.auth.tokens(), result.tokens.refresh_token));
    let message = format!("Welcome back {}", result.admin.username);
    let data = LoginData {
        admin: result.admin,
        access_token: result.tokens.access_token,
    };

    Ok((jar, ApiResponse::ok(message, data)))
}
