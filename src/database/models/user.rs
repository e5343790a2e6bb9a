use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;
use crate::database::strategies::Entity;

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
    Moderator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "moderator" => Ok(UserRole::Moderator),
            other => Err(ParseEnumError::new("user role", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(ParseEnumError::new("user status", other)),
        }
    }
}

/// Stored user record. Never serialize this to clients; use [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub login_attempts: u8,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }

    fn record_failed_login(&mut self, failure: FailedLogin, now: DateTime<Utc>) {
        if self.is_locked(now) {
            return;
        }
        let attempts = self.login_attempts.saturating_add(1);
        if attempts >= failure.max_attempts {
            self.login_attempts = 0;
            self.locked_until = Some(failure.lock_until);
        } else {
            self.login_attempts = attempts;
        }
    }
}

/// Client-facing projection of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            status: user.status,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
}

/// Partial update. `locked_until: Some(None)` clears the lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_attempts: Option<u8>,
    pub locked_until: Option<Option<DateTime<Utc>>>,
    /// Counted against the stored row inside the store's read-modify-write.
    pub failed_login: Option<FailedLogin>,
}

/// One wrong password. Reaching `max_attempts` locks the account until
/// `lock_until` and resets the counter. Ignored while a lock is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailedLogin {
    pub max_attempts: u8,
    pub lock_until: DateTime<Utc>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Entity for User {
    type Draft = NewUser;
    type Patch = UserPatch;

    const COLLECTION: &'static str = "users";
    const SOFT_DELETE: bool = true;
    const UNIQUE_FIELDS: &'static [&'static str] = &["email"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn build(draft: NewUser, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name.trim().to_string(),
            email: normalize_email(&draft.email),
            password_hash: draft.password_hash,
            role: draft.role,
            status: draft.status,
            last_login: None,
            login_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, patch: UserPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = patch.email {
            self.email = normalize_email(&email);
        }
        if let Some(password_hash) = patch.password_hash {
            self.password_hash = password_hash;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(last_login) = patch.last_login {
            self.last_login = Some(last_login);
        }
        if let Some(attempts) = patch.login_attempts {
            self.login_attempts = attempts;
        }
        if let Some(locked_until) = patch.locked_until {
            self.locked_until = locked_until;
        }
        if let Some(failure) = patch.failed_login {
            self.record_failed_login(failure, now);
        }
        self.updated_at = now;
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;
        let attempts: i16 = row.try_get("login_attempts")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: role.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            status: status.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            last_login: row.try_get("last_login")?,
            login_attempts: u8::try_from(attempts).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            locked_until: row.try_get("locked_until")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User::build(
            NewUser {
                name: " Diana Prince ".to_string(),
                email: " Diana@Themyscira.COM ".to_string(),
                password_hash: "$2b$04$hash".to_string(),
                role: UserRole::default(),
                status: UserStatus::default(),
            },
            Uuid::new_v4(),
            Utc::now(),
        )
    }

    #[test]
    fn build_lowercases_email() {
        let user = user();
        assert_eq!(user.email, "diana@themyscira.com");
        assert_eq!(user.name, "Diana Prince");
        assert_eq!(user.role, UserRole::User);
        assert!(user.is_active());
        assert_eq!(user.login_attempts, 0);
    }

    #[test]
    fn profile_hides_credentials() {
        let profile = serde_json::to_value(user().profile()).unwrap();
        assert!(profile.get("password_hash").is_none());
        assert!(profile.get("login_attempts").is_none());
        assert_eq!(profile["email"], "diana@themyscira.com");
        assert_eq!(profile["role"], "user");
    }

    #[test]
    fn lock_expires_with_time() {
        let now = Utc::now();
        let mut user = user();
        user.apply(
            UserPatch {
                locked_until: Some(Some(now + Duration::minutes(15))),
                ..Default::default()
            },
            now,
        );
        assert!(user.is_locked(now));
        assert!(!user.is_locked(now + Duration::minutes(16)));

        user.apply(
            UserPatch {
                locked_until: Some(None),
                ..Default::default()
            },
            now,
        );
        assert!(!user.is_locked(now));
    }

    #[test]
    fn roles_parse_from_text() {
        assert_eq!("moderator".parse::<UserRole>(), Ok(UserRole::Moderator));
        assert!("root".parse::<UserRole>().is_err());
        assert_eq!("suspended".parse::<UserStatus>(), Ok(UserStatus::Suspended));
    }

    #[test]
    fn failed_logins_count_against_the_stored_row() {
        let now = Utc::now();
        let failure = FailedLogin {
            max_attempts: 3,
            lock_until: now + Duration::minutes(15),
        };
        let mut user = user();
        for expected in [1, 2] {
            user.apply(
                UserPatch {
                    failed_login: Some(failure),
                    ..Default::default()
                },
                now,
            );
            assert_eq!(user.login_attempts, expected);
        }

        user.apply(
            UserPatch {
                failed_login: Some(failure),
                ..Default::default()
            },
            now,
        );
        assert_eq!(user.login_attempts, 0);
        assert_eq!(user.locked_until, Some(now + Duration::minutes(15)));

        // Further failures while locked neither count nor extend the lock.
        let later = FailedLogin {
            max_attempts: 3,
            lock_until: now + Duration::minutes(30),
        };
        user.apply(
            UserPatch {
                failed_login: Some(later),
                ..Default::default()
            },
            now,
        );
        assert_eq!(user.login_attempts, 0);
        assert_eq!(user.locked_until, Some(now + Duration::minutes(15)));
    }
}
