// handlers/public/mod.rs - Handlers that need no authentication
//
// Token acquisition, the bulk bible read used by the public app, and health.
pub mod auth;
pub mod bible;
pub mod health;
