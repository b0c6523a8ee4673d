use axum::extract::State;

use crate::api::validation::{self, CredentialsBody};
use crate::app::AppState;
use crate::database::models::AdminUser;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};

/// POST /auth/signup - register an admin; the role is always ADMIN
pub async fn signup_post(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CredentialsBody>,
) -> ApiResult<AdminUser> {
    let credentials = validation::credentials(body)?;
    let admin = state.auth.signup(&credentials.username, &credentials.password).await?;
    Ok(ApiResponse::created("Admin registration successfull", admin))
}
