use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::DatabaseError;

/// Access tokens authorize requests; refresh tokens only mint new pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid Credentials")]
    InvalidCredentials,

    #[error("Invalid token type")]
    WrongTokenType,

    #[error("Invalid access token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("User not found")]
    UnknownUser,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Admin with this username already exist")]
    UsernameTaken,

    #[error("{0} secret is not configured")]
    MissingSecret(&'static str),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies both token kinds, each with its own secret
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn from_config(security: &SecurityConfig) -> Result<Self, AuthError> {
        if security.access_token_secret.is_empty() {
            return Err(AuthError::MissingSecret("ACCESS_TOKEN"));
        }
        if security.refresh_token_secret.is_empty() {
            return Err(AuthError::MissingSecret("REFRESH_TOKEN"));
        }

        Ok(Self::new(
            &security.access_token_secret,
            &security.refresh_token_secret,
            Duration::hours(security.access_token_expiry_hours),
            Duration::days(security.refresh_token_expiry_days),
        ))
    }

    pub fn new(access_secret: &str, refresh_secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue(&self, kind: TokenKind, user_id: Uuid, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let (key, ttl) = match kind {
            TokenKind::Access => (&self.access_encoding, self.access_ttl),
            TokenKind::Refresh => (&self.refresh_encoding, self.refresh_ttl),
        };

        let claims = Claims {
            user_id,
            username: username.to_string(),
            kind,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        Ok(encode(&Header::default(), &claims, key)?)
    }

    pub fn issue_pair(&self, user_id: Uuid, username: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(TokenKind::Access, user_id, username)?,
            refresh_token: self.issue(TokenKind::Refresh, user_id, username)?,
        })
    }

    /// Check signature, expiry and that the token is of the `expected` kind
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let key = match expected {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        let claims = decode::<Claims>(token, key, &Validation::default())?.claims;
        if claims.kind != expected {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
    }
}

/// Plaintext behind `PasswordHashing::decoy_hash`; never stored for any admin
const DECOY_PASSWORD: &str = "dabar-api-decoy-password";

/// Argon2id password hashing with configurable cost
#[derive(Debug, Clone)]
pub struct PasswordHashing {
    params: Params,
    decoy: Arc<str>,
}

impl PasswordHashing {
    pub fn from_config(security: &SecurityConfig) -> Result<Self, AuthError> {
        Self::new(security.password_memory_kib, security.password_iterations)
    }

    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, AuthError> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let mut hashing = Self {
            params,
            decoy: Arc::from(""),
        };
        hashing.decoy = Arc::from(hashing.hash(DECOY_PASSWORD)?);
        Ok(hashing)
    }

    /// Hash with the configured cost that no login can match, verified in
    /// place of a stored hash when the username is unknown
    pub fn decoy_hash(&self) -> &str {
        &self.decoy
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// PHC-encoded hash with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// False for a wrong password and for a stored value that is not a valid hash
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self.hasher().verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}
