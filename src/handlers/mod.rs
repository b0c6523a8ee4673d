// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) and Protected (bearer token + admin re-validation).
pub mod protected;
pub mod public;
