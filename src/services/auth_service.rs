use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, Claims, PasswordHashing, TokenIssuer, TokenKind, TokenPair};
use crate::database::manager::DatabaseError;
use crate::database::models::AdminUser;
use crate::database::repository::AdminRepository;

/// Admin sign-up, login and token refresh
#[derive(Clone)]
pub struct AuthService {
    admins: AdminRepository,
    tokens: TokenIssuer,
    hashing: PasswordHashing,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub admin: AdminUser,
    pub tokens: TokenPair,
}

impl AuthService {
    pub fn new(admins: AdminRepository, tokens: TokenIssuer, hashing: PasswordHashing) -> Self {
        Self { admins, tokens, hashing }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Register a new admin with an Argon2id-hashed password
    pub async fn signup(&self, username: &str, password: &str) -> Result<AdminUser, AuthError> {
        if self.admins.find_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let hash = self.hash_password(password).await?;
        let admin = self.admins.create(username, &hash).await.map_err(|err| match err {
            // Lost a race with a concurrent signup for the same name
            DatabaseError::Conflict(_) => AuthError::UsernameTaken,
            other => AuthError::Database(other),
        })?;

        info!("Registered admin {} ({})", admin.username, admin.id);
        Ok(admin)
    }

    /// Unknown usernames and wrong passwords fail the same way, and both
    /// pay for one Argon2id verification
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let admin = self.admins.find_by_username(username).await?;

        let stored = hash_to_check(admin.as_ref(), &self.hashing).to_string();
        let verified = self.verify_password(password, &stored).await?;

        let admin = match admin {
            Some(admin) if verified => admin,
            Some(_) => {
                warn!("Login failed for admin '{}': wrong password", username);
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                warn!("Login failed for unknown admin '{}'", username);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let tokens = self.tokens.issue_pair(admin.id, &admin.username)?;
        info!("Admin {} logged in", admin.username);
        Ok(LoginResult { admin, tokens })
    }

    /// Exchange a refresh token for a fresh pair. Every token or lookup
    /// failure collapses into `InvalidRefreshToken`; storage errors do not.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let admin = self
            .admins
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        self.tokens.issue_pair(admin.id, &admin.username)
    }

    /// Verify an access token
    pub fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify(access_token, TokenKind::Access)
    }

    pub async fn find_admin(&self, id: Uuid) -> Result<Option<AdminUser>, AuthError> {
        Ok(self.admins.find_by_id(id).await?)
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hashing = self.hashing.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hashing.hash(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    async fn verify_password(&self, password: &str, stored: &str) -> Result<bool, AuthError> {
        let hashing = self.hashing.clone();
        let password = password.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || hashing.verify(&password, &stored))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }
}

/// The stored hash for a known admin, the decoy otherwise
fn hash_to_check<'a>(admin: Option<&'a AdminUser>, hashing: &'a PasswordHashing) -> &'a str {
    match admin {
        Some(admin) => &admin.password,
        None => hashing.decoy_hash(),
    }
}
