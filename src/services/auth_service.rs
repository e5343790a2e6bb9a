use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, JwtError, JwtService, PasswordError};
use crate::config::{SecurityConfig, MAX_LOCKOUT_MINUTES};
use crate::database::models::{FailedLogin, NewUser, User, UserPatch, UserProfile, UserRole, UserStatus};
use crate::database::{Context, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already in use")]
    EmailInUse,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Account is locked until {0}")]
    AccountLocked(DateTime<Utc>),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => AuthError::EmailInUse,
            other => AuthError::Store(other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
    pub expires_in: i64,
}

/// Registration, login and admin provisioning on top of the user context.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<Context<User>>,
    jwt: JwtService,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(users: Arc<Context<User>>, jwt: JwtService, security: SecurityConfig) -> Self {
        Self { users, jwt, security }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }
        let password_hash = hash_password(password, self.security.bcrypt_cost).await?;
        let user = self
            .users
            .create(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role: UserRole::User,
                status: UserStatus::Active,
            })
            .await?;
        info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let now = Utc::now();
        let Some(user) = self.users.find_by_email(email).await? else {
            warn!("Login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if let Some(until) = user.locked_until.filter(|until| *until > now) {
            warn!("Login refused for locked user {}", user.id);
            return Err(AuthError::AccountLocked(until));
        }

        if !verify_password(password, &user.password_hash).await? {
            self.record_failure(&user, now).await?;
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active() {
            warn!("Login refused for {} user {}", user.status, user.id);
            return Err(AuthError::AccountDisabled);
        }

        let patch = UserPatch {
            last_login: Some(now),
            login_attempts: Some(0),
            locked_until: Some(None),
            ..Default::default()
        };
        let user = self
            .users
            .update(user.id, patch)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let issued = self.jwt.issue(&user)?;
        info!("User {} logged in", user.id);
        Ok(LoginResponse {
            user: user.profile(),
            token: issued.token,
            expires_in: issued.expires_in,
        })
    }

    async fn record_failure(&self, user: &User, now: DateTime<Utc>) -> Result<(), AuthError> {
        let lockout = Duration::minutes(self.security.lockout_minutes.clamp(1, MAX_LOCKOUT_MINUTES));
        let patch = UserPatch {
            failed_login: Some(FailedLogin {
                max_attempts: self.security.max_login_attempts,
                lock_until: now + lockout,
            }),
            ..Default::default()
        };
        match self.users.update(user.id, patch).await? {
            Some(updated) if updated.is_locked(now) => {
                warn!("User {} locked until {:?} after failed logins", updated.id, updated.locked_until)
            }
            Some(updated) => warn!("Login failed for user {} (attempt {})", updated.id, updated.login_attempts),
            None => warn!("Login failed for user {} that no longer exists", user.id),
        }
        Ok(())
    }

    /// Create an admin account, or promote and reactivate an existing one.
    /// Returns the user and whether it was newly created.
    pub async fn create_admin(&self, name: &str, email: &str, password: &str) -> Result<(User, bool), AuthError> {
        let password_hash = hash_password(password, self.security.bcrypt_cost).await?;

        if let Some(existing) = self.users.find_by_email(email).await? {
            let patch = UserPatch {
                name: Some(name.to_string()),
                password_hash: Some(password_hash),
                role: Some(UserRole::Admin),
                status: Some(UserStatus::Active),
                login_attempts: Some(0),
                locked_until: Some(None),
                ..Default::default()
            };
            let user = self
                .users
                .update(existing.id, patch)
                .await?
                .ok_or(AuthError::InvalidCredentials)?;
            info!("Promoted {} to admin", user.email);
            return Ok((user, false));
        }

        let user = self
            .users
            .create(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role: UserRole::Admin,
                status: UserStatus::Active,
            })
            .await?;
        info!("Created admin {}", user.email);
        Ok((user, true))
    }
}
