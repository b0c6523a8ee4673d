use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::app::AppState;
use crate::database::models::{AdminUser, ADMIN_ROLE};
use crate::error::ApiError;

/// Admin record confirmed to still exist for the current request
#[derive(Clone, Debug)]
pub struct ValidatedAdmin {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

/// Re-checks on every request that the token's admin still exists.
/// Must run after `jwt_auth_middleware`.
pub async fn validate_admin_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Access token required"))?;

    let stored = state.auth.find_admin(auth_user.user_id).await?;
    let admin = check_admin(&auth_user, stored)?;

    tracing::debug!("Admin validated: {} ({})", admin.username, admin.id);
    request.extensions_mut().insert(ValidatedAdmin {
        id: admin.id,
        username: admin.username,
        role: admin.role,
    });

    Ok(next.run(request).await)
}

/// A missing id means the account is gone (401); an id whose name or role no
/// longer matches the token is reported as a missing admin (404)
fn check_admin(auth_user: &AuthUser, stored: Option<AdminUser>) -> Result<AdminUser, ApiError> {
    let Some(admin) = stored else {
        tracing::warn!(
            "Admin validation failed: '{}' ({}) no longer exists",
            auth_user.username,
            auth_user.user_id
        );
        return Err(ApiError::unauthorized("User not found"));
    };

    if admin.username != auth_user.username || admin.role != ADMIN_ROLE {
        tracing::warn!(
            "Admin validation failed: token for '{}' does not match admin {} ('{}', {})",
            auth_user.username,
            admin.id,
            admin.username,
            admin.role
        );
        return Err(ApiError::not_found("Admin does not exist"));
    }

    Ok(admin)
}
