use crate::{
    credentials::CredentialState,
    error::{AppError, AppResult},
    models::{AuthResponse, NewUser, SigninRequest, SignupRequest},
    repository::RepositoryState,
};

fn required<'a>(value: &'a str, field: &str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value)
}

/// AccountService
///
/// Signup and signin. The password digest is computed here, explicitly, before the
/// user record is built.
#[derive(Clone)]
pub struct AccountService {
    repo: RepositoryState,
    credentials: CredentialState,
}

impl AccountService {
    pub fn new(repo: RepositoryState, credentials: CredentialState) -> Self {
        Self { repo, credentials }
    }

    pub async fn signup(&self, req: SignupRequest) -> AppResult<AuthResponse> {
        let first_name = required(&req.first_name, "first_name")?;
        let last_name = required(&req.last_name, "last_name")?;
        let email = required(&req.email, "email")?.to_lowercase();
        if req.password.trim().is_empty() {
            return Err(AppError::validation("password is required"));
        }
        if !email.contains('@') {
            return Err(AppError::validation("email is not valid"));
        }

        let password_hash = self.credentials.hash_password(&req.password).await?;

        let user = self
            .repo
            .create_user(NewUser {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email,
                password_hash,
            })
            .await?;

        let token = self.credentials.issue_token(user.id)?;
        tracing::info!(user_id = %user.id, "user registered");

        Ok(AuthResponse {
            user: user.public(),
            token,
        })
    }

    /// signin
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn signin(&self, req: SigninRequest) -> AppResult<AuthResponse> {
        let email = required(&req.email, "email")?.to_lowercase();
        if req.password.trim().is_empty() {
            return Err(AppError::validation("password is required"));
        }

        let invalid = || AppError::unauthenticated("incorrect email or password");

        let user = self
            .repo
            .find_user_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        if !self
            .credentials
            .verify_password(&req.password, &user.password_hash)
            .await
        {
            return Err(invalid());
        }

        let token = self.credentials.issue_token(user.id)?;
        tracing::info!(user_id = %user.id, "user signed in");

        Ok(AuthResponse {
            user: user.public(),
            token,
        })
    }
}
