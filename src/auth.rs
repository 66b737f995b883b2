use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    credentials::{CredentialService, CredentialState},
    error::AppError,
    models::User,
    repository::{Repository, RepositoryState},
};

/// authenticate
///
/// The authorization guard. Resolves a raw `Authorization` header value into the
/// full `User` record, or fails with `Unauthenticated`.
///
/// Accepts both `Bearer <token>` and a bare `<token>`. Stateless: the only reads are
/// token verification and the user lookup, so a token whose subject has since been
/// removed is rejected.
pub async fn authenticate(
    credential: Option<&str>,
    credentials: &dyn CredentialService,
    repo: &dyn Repository,
) -> Result<User, AppError> {
    let raw = credential
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::unauthenticated("no token provided"))?;

    let token = match raw.strip_prefix("Bearer ") {
        Some(rest) => rest.trim(),
        None => raw,
    };

    if token.is_empty() {
        return Err(AppError::unauthenticated("invalid token"));
    }

    let claims = credentials.verify_token(token)?;

    repo.find_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthenticated("user no longer exists"))
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take it as an argument;
/// the extractor rejects with a structured 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    CredentialState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by `auth_middleware`.
        if let Some(resolved) = parts.extensions.get::<AuthUser>() {
            return Ok(resolved.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let credentials = CredentialState::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match authenticate(header_value, credentials.as_ref(), repo.as_ref()).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(err) => {
                tracing::debug!(reason = %err, "rejected request credential");
                Err(err)
            }
        }
    }
}
