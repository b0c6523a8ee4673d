// handlers/protected/mod.rs - Admin-only resource handlers
//
// Every route here sits behind jwt_auth_middleware and validate_admin_middleware.
pub mod book;
pub mod chapter;
pub mod verse;
