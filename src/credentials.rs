use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

/// Claims
///
/// Payload carried inside every bearer token issued by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the id of the user the token was issued to.
    pub sub: Uuid,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued at (seconds since epoch).
    pub iat: usize,
}

/// CredentialService
///
/// Opaque capability over secrets: one-way password digests and bearer tokens.
/// The guard and the account service receive it as an injected dependency.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Computes a salted one-way digest of `secret`.
    async fn hash_password(&self, secret: &str) -> AppResult<String>;

    /// Returns true only when `secret` matches `digest`.
    async fn verify_password(&self, secret: &str, digest: &str) -> bool;

    /// Issues a signed bearer token whose subject is `user_id`.
    fn issue_token(&self, user_id: Uuid) -> AppResult<String>;

    /// Validates signature and expiry, yielding the claims.
    fn verify_token(&self, token: &str) -> AppResult<Claims>;
}

/// CredentialState
///
/// The concrete type used to share the credential service across the application state.
pub type CredentialState = Arc<dyn CredentialService>;

/// JwtCredentialService
///
/// Argon2id digests plus HS256 JSON Web Tokens.
#[derive(Clone)]
pub struct JwtCredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
}

impl JwtCredentialService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.jwt_ttl_secs)
    }
}

#[async_trait]
impl CredentialService for JwtCredentialService {
    async fn hash_password(&self, secret: &str) -> AppResult<String> {
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(secret.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|err| {
                    tracing::error!("password hashing failed: {:?}", err);
                    AppError::StoreUnavailable("unable to process credentials".to_string())
                })
        })
        .await
        .map_err(|err| {
            tracing::error!("password hashing task failed: {:?}", err);
            AppError::StoreUnavailable("unable to process credentials".to_string())
        })?
    }

    async fn verify_password(&self, secret: &str, digest: &str) -> bool {
        let secret = secret.to_owned();
        let digest = digest.to_owned();
        tokio::task::spawn_blocking(move || match PasswordHash::new(&digest) {
            Ok(parsed) => Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(err) => {
                tracing::warn!("stored password digest is unparsable: {:?}", err);
                false
            }
        })
        .await
        .unwrap_or(false)
    }

    fn issue_token(&self, user_id: Uuid) -> AppResult<String> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: user_id,
            iat: now as usize,
            exp: (now + self.ttl_secs) as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|err| {
            tracing::error!("token signing failed: {:?}", err);
            AppError::StoreUnavailable("unable to issue token".to_string())
        })
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Err(AppError::unauthenticated("token expired")),
                _ => Err(AppError::unauthenticated("invalid token")),
            },
        }
    }
}
