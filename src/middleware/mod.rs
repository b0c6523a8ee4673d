pub mod auth;
pub mod extract;
pub mod response;
pub mod validate_admin;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use extract::ApiJson;
pub use response::{ApiResponse, ApiResult};
pub use validate_admin::{validate_admin_middleware, ValidatedAdmin};
