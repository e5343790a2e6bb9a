use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. When absent the URL is assembled from the parts below.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

/// Which backend serves each collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub heroes: StorageBackend,
    pub users: StorageBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Document,
    Relational,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Document => "document",
            StorageBackend::Relational => "relational",
        }
    }

    pub fn needs_database(&self) -> bool {
        !matches!(self, StorageBackend::Memory)
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "document" | "documents" | "doc" => Ok(StorageBackend::Document),
            "relational" | "sql" | "postgres" => Ok(StorageBackend::Relational),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub bcrypt_cost: u32,
    pub max_login_attempts: u8,
    pub lockout_minutes: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown storage backend: {0} (expected memory, document or relational)")]
    UnknownBackend(String),

    #[error("JWT_SECRET must be set")]
    MissingJwtSecret,

    #[error("BCRYPT_COST must be between 4 and 31, got {0}")]
    InvalidBcryptCost(u32),

    #[error("SECURITY_MAX_LOGIN_ATTEMPTS must be at least 1")]
    InvalidLoginAttempts,

    #[error("SECURITY_JWT_EXPIRY_HOURS must be between 1 and {MAX_JWT_EXPIRY_HOURS}, got {0}")]
    InvalidJwtExpiry(u64),

    #[error("SECURITY_LOCKOUT_MINUTES must be between 1 and {MAX_LOCKOUT_MINUTES}, got {0}")]
    InvalidLockout(i64),
}

pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;
pub const MAX_LOCKOUT_MINUTES: i64 = 60 * 24 * 30;

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server
        override_string("HOST", &mut self.server.host);
        if let Some(port) = env::var("HERO_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Database
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        let db = &mut self.database;
        override_string("POSTGRES_HOST", &mut db.host);
        override_parsed("POSTGRES_PORT", &mut db.port);
        override_string("POSTGRES_USER", &mut db.user);
        override_string("POSTGRES_PASSWORD", &mut db.password);
        override_string("POSTGRES_DB", &mut db.name);
        override_parsed("DATABASE_MAX_CONNECTIONS", &mut db.max_connections);
        override_parsed("DATABASE_CONNECTION_TIMEOUT", &mut db.connection_timeout);
        override_parsed("DATABASE_ENABLE_QUERY_LOGGING", &mut db.enable_query_logging);

        // Storage
        override_parsed("HERO_STORE", &mut self.storage.heroes);
        override_parsed("USER_STORE", &mut self.storage.users);

        // Security
        let sec = &mut self.security;
        override_string("JWT_SECRET", &mut sec.jwt_secret);
        override_parsed("SECURITY_JWT_EXPIRY_HOURS", &mut sec.jwt_expiry_hours);
        override_string("JWT_ISSUER", &mut sec.jwt_issuer);
        override_string("JWT_AUDIENCE", &mut sec.jwt_audience);
        override_parsed("BCRYPT_COST", &mut sec.bcrypt_cost);
        override_parsed("SECURITY_MAX_LOGIN_ATTEMPTS", &mut sec.max_login_attempts);
        override_parsed("SECURITY_LOCKOUT_MINUTES", &mut sec.lockout_minutes);

        self
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost(self.security.bcrypt_cost));
        }
        if self.security.max_login_attempts == 0 {
            return Err(ConfigError::InvalidLoginAttempts);
        }
        if !(1..=MAX_JWT_EXPIRY_HOURS).contains(&self.security.jwt_expiry_hours) {
            return Err(ConfigError::InvalidJwtExpiry(self.security.jwt_expiry_hours));
        }
        if !(1..=MAX_LOCKOUT_MINUTES).contains(&self.security.lockout_minutes) {
            return Err(ConfigError::InvalidLockout(self.security.lockout_minutes));
        }
        Ok(())
    }

    pub fn needs_database(&self) -> bool {
        self.storage.heroes.needs_database() || self.storage.users.needs_database()
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: None,
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                name: "heroes".to_string(),
                max_connections: 5,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            storage: StorageConfig {
                heroes: StorageBackend::Document,
                users: StorageBackend::Relational,
            },
            security: SecurityConfig {
                jwt_secret: "development-only-secret-change-me".to_string(),
                jwt_expiry_hours: 4,
                jwt_issuer: "api-strategy".to_string(),
                jwt_audience: "api-client".to_string(),
                bcrypt_cost: 10,
                max_login_attempts: 5,
                lockout_minutes: 15,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 10,
                enable_query_logging: true,
                ..Self::development().database
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                bcrypt_cost: 12,
                ..Self::development().security
            },
            ..Self::development()
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 5,
                enable_query_logging: false,
                ..Self::development().database
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                bcrypt_cost: 12,
                ..Self::development().security
            },
            ..Self::development()
        }
    }
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(v) = env::var(key) {
        *target = v;
    }
}

/// Unparseable values are logged and leave the default in place.
fn override_parsed<T>(key: &str, target: &mut T)
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *target = parsed,
            Err(e) => tracing::warn!("Ignoring {}={:?}: {}", key, v, e),
        }
    }
}

// Read once, on first access.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults_use_postgres_backends() {
        let config = AppConfig::development();
        assert_eq!(config.storage.heroes, StorageBackend::Document);
        assert_eq!(config.storage.users, StorageBackend::Relational);
        assert!(config.needs_database());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_requires_explicit_secret() {
        let config = AppConfig::production();
        assert_eq!(config.security.jwt_expiry_hours, 4);
        assert_eq!(config.validate(), Err(ConfigError::MissingJwtSecret));
    }

    #[test]
    fn rejects_out_of_range_bcrypt_cost() {
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 2;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBcryptCost(2)));
    }

    #[test]
    fn rejects_unbounded_expiry_and_lockout() {
        let mut config = AppConfig::development();
        config.security.jwt_expiry_hours = u64::MAX;
        assert_eq!(config.validate(), Err(ConfigError::InvalidJwtExpiry(u64::MAX)));

        let mut config = AppConfig::development();
        config.security.jwt_expiry_hours = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidJwtExpiry(0)));

        let mut config = AppConfig::development();
        config.security.lockout_minutes = -5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidLockout(-5)));

        config.security.lockout_minutes = i64::MAX;
        assert_eq!(config.validate(), Err(ConfigError::InvalidLockout(i64::MAX)));
    }

    #[test]
    fn parses_backend_aliases() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!(" Document ".parse::<StorageBackend>(), Ok(StorageBackend::Document));
        assert_eq!("postgres".parse::<StorageBackend>(), Ok(StorageBackend::Relational));
        assert!("mongo-ish".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn memory_only_config_needs_no_database() {
        let mut config = AppConfig::development();
        config.storage.heroes = StorageBackend::Memory;
        config.storage.users = StorageBackend::Memory;
        assert!(!config.needs_database());
    }
}
