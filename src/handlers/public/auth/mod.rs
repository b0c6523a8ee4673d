// handlers/public/auth/mod.rs - Admin token acquisition
//
// POST /auth/signup   create an admin account
// POST /auth/login    exchange credentials for an access token + refresh cookie
// POST /auth/refresh  rotate the refresh cookie and mint a new access token

use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::auth::TokenIssuer;

pub mod login;
pub mod refresh;
pub mod signup;

pub use login::login_post;
pub use refresh::refresh_post;
pub use signup::signup_post;

pub const REFRESH_COOKIE: &str = "refreshToken";

/// httpOnly cookie carrying the refresh token, living as long as the token does
pub(crate) fn refresh_cookie(tokens: &TokenIssuer, refresh_token: String) -> Cookie<'static> {
    let max_age = time::Duration::seconds(tokens.refresh_ttl().num_seconds());
    Cookie::build((REFRESH_COOKIE, refresh_token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .max_age(max_age)
        .build()
}
