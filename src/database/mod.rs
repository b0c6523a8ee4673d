pub mod bible;
pub mod manager;
pub mod models;
pub mod ordinal;
pub mod repository;
pub mod seed;

pub use manager::{Database, DatabaseError};
pub use repository::{AdminRepository, Entity, Repository};
