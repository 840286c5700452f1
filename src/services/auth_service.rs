//! Authentication service - registration, login and password reset.
//!
//! Passwords are handled through the domain `Password` value object;
//! identity is carried in HS256 bearer tokens.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{
    Config, RESET_TOKEN_EXPIRATION_HOURS, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER,
};
use crate::domain::{Password, User, UserResponse};
use crate::errors::{AppError, AppResult};
use crate::infra::{JobQueue, NewUser, UnitOfWork};
use crate::jobs::EmailJob;

/// JWT claims payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

/// Registration result: the created profile plus a session token
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub user: UserResponse,
    pub token: TokenResponse,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user and log them in
    async fn register(
        &self,
        first_name: String,
        last_name: String,
        email: String,
        password: String,
    ) -> AppResult<RegisteredUser>;

    /// Login and return JWT token
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse>;

    /// Verify JWT token and extract claims
    fn verify_token(&self, token: &str) -> AppResult<Claims>;

    /// Issue a password-reset token and queue the reset email.
    ///
    /// Deliberately succeeds for unknown addresses so the endpoint
    /// cannot be used to enumerate accounts.
    async fn forgot_password(&self, email: String) -> AppResult<()>;

    /// Redeem a reset token for a new password
    async fn reset_password(&self, token: String, new_password: String) -> AppResult<()>;
}

/// Generate JWT token for a user
fn generate_token(user: &User, config: &Config) -> AppResult<TokenResponse> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: config.jwt_expiration_hours * SECONDS_PER_HOUR,
    })
}

/// Concrete implementation of AuthService using Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    config: Config,
    jobs: Option<Arc<JobQueue>>,
}

impl<U: UnitOfWork> Authenticator<U> {
    /// Create new auth service instance with Unit of Work
    pub fn new(uow: Arc<U>, config: Config) -> Self {
        Self {
            uow,
            config,
            jobs: None,
        }
    }

    /// Attach the background job queue used for reset emails
    pub fn with_job_queue(mut self, jobs: Arc<JobQueue>) -> Self {
        self.jobs = Some(jobs);
        self
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn register(
        &self,
        first_name: String,
        last_name: String,
        email: String,
        password: String,
    ) -> AppResult<RegisteredUser> {
        // Email format and name presence are validated by the handler's
        // ValidatedJson extractor; uniqueness is checked here.
        if self.uow.users().find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("User already exists"));
        }

        let password_hash = Password::new(&password)?.into_string();
        let user = self
            .uow
            .users()
            .create(NewUser {
                first_name,
                last_name,
                email,
                password_hash,
            })
            .await?;

        let token = generate_token(&user, &self.config)?;

        Ok(RegisteredUser {
            user: UserResponse::from(user),
            token,
        })
    }

    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse> {
        let user_result = self.uow.users().find_by_email(&email).await?;

        // SECURITY: verify against a dummy hash when the user does not
        // exist so response timing cannot enumerate valid emails.
        let dummy_hash =
            "$argon2id$v=19$m=19456,t=2,p=1$dummysalt123456$dummyhash1234567890123456789012";

        let (password_hash, user_exists) = match &user_result {
            Some(user) => (user.password_hash.as_str(), true),
            None => (dummy_hash, false),
        };

        let stored_password = Password::from_hash(password_hash.to_string());
        let password_valid = stored_password.verify(&password);

        if !user_exists || !password_valid {
            return Err(AppError::InvalidCredentials);
        }

        // Guarded by user_exists above
        let user = user_result.as_ref().ok_or(AppError::InvalidCredentials)?;
        generate_token(user, &self.config)
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    async fn forgot_password(&self, email: String) -> AppResult<()> {
        let Some(user) = self.uow.users().find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = Uuid::new_v4().simple().to_string();
        let expires = Utc::now() + Duration::hours(RESET_TOKEN_EXPIRATION_HOURS);

        self.uow
            .users()
            .set_reset_token(user.id, token.clone(), expires)
            .await?;

        match &self.jobs {
            Some(jobs) => {
                jobs.enqueue_email(EmailJob::password_reset(user.email.as_str(), &token))
                    .await?;
            }
            None => {
                tracing::warn!("No job queue configured; reset email not sent");
            }
        }

        Ok(())
    }

    async fn reset_password(&self, token: String, new_password: String) -> AppResult<()> {
        let user = self
            .uow
            .users()
            .find_by_reset_token(&token)
            .await?
            .filter(|user| user.reset_token_valid(&token, Utc::now()))
            .ok_or_else(|| AppError::validation("Invalid or expired reset token"))?;

        let password_hash = Password::new(&new_password)?.into_string();
        self.uow.users().update_password(user.id, password_hash).await
    }
}
