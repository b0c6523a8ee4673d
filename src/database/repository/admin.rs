use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{Database, DatabaseError};
use crate::database::models::admin_user::{AdminUser, ADMIN_ROLE};

/// Admin accounts; not ordered, so they sit outside the generic repository
#[derive(Clone)]
pub struct AdminRepository {
    pool: PgPool,
}

impl AdminRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AdminUser>, DatabaseError> {
        let admin = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(admin)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<AdminUser>, DatabaseError> {
        let admin = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(admin)
    }

    /// Insert a new admin; a taken username surfaces as `Conflict`
    pub async fn create(&self, username: &str, password_hash: &str) -> Result<AdminUser, DatabaseError> {
        let admin = sqlx::query_as::<_, AdminUser>(
            "INSERT INTO admin_users (id, username, password, role)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(ADMIN_ROLE)
        .fetch_one(&self.pool)
        .await?;
        Ok(admin)
    }
}
