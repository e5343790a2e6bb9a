pub mod password;

pub use password::{hash_password, verify_password, PasswordError};

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{SecurityConfig, MAX_JWT_EXPIRY_HOURS};
use crate::database::models::{User, UserRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("JWT expiry of {0} hours is out of range")]
    InvalidExpiry(u64),
}

/// A freshly signed token and its lifetime in seconds.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

/// Signs and verifies HS256 access tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl JwtService {
    pub fn new(security: &SecurityConfig) -> Result<Self, JwtError> {
        if security.jwt_secret.is_empty() {
            return Err(JwtError::MissingSecret);
        }
        let secret = security.jwt_secret.as_bytes();
        let expiry = Some(security.jwt_expiry_hours)
            .filter(|hours| (1..=MAX_JWT_EXPIRY_HOURS).contains(hours))
            .and_then(|hours| Duration::try_hours(hours as i64))
            .ok_or(JwtError::InvalidExpiry(security.jwt_expiry_hours))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&security.jwt_issuer]);
        validation.set_audience(&[&security.jwt_audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: security.jwt_issuer.clone(),
            audience: security.jwt_audience.clone(),
            expiry,
        })
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_in: self.expiry.num_seconds(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{NewUser, UserStatus};
    use crate::database::Entity;

    fn user() -> User {
        User::build(
            NewUser {
                name: "Clark Kent".to_string(),
                email: "clark@dailyplanet.com".to_string(),
                password_hash: "hash".to_string(),
                role: UserRole::Admin,
                status: UserStatus::Active,
            },
            Uuid::new_v4(),
            Utc::now(),
        )
    }

    fn service() -> JwtService {
        JwtService::new(&AppConfig::development().security).unwrap()
    }

    #[test]
    fn out_of_range_expiry_is_rejected() {
        let mut security = AppConfig::development().security;
        security.jwt_expiry_hours = u64::MAX;
        assert!(matches!(JwtService::new(&security), Err(JwtError::InvalidExpiry(u64::MAX))));
    }

    #[test]
    fn issued_token_verifies() {
        let jwt = service();
        let user = user();
        let issued = jwt.issue(&user).unwrap();
        assert_eq!(issued.expires_in, 4 * 3600);

        let claims = jwt.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.iss, "api-strategy");
        assert_eq!(claims.aud, "api-client");
    }

    #[test]
    fn rejects_other_audience() {
        let mut security = AppConfig::development().security;
        security.jwt_audience = "someone-else".to_string();
        let foreign = JwtService::new(&security).unwrap();
        let token = foreign.issue(&user()).unwrap().token;

        assert!(matches!(service().verify(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn rejects_tampered_signature() {
        let token = service().issue(&user()).unwrap().token;
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(service().verify(&tampered).is_err());
        assert!(service().verify("not.a.jwt").is_err());
    }

    #[test]
    fn reports_expiry() {
        let security = AppConfig::development().security;
        let past = Utc::now() - Duration::hours(2);
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "old@example.com".to_string(),
            role: UserRole::User,
            iss: security.jwt_issuer.clone(),
            aud: security.jwt_audience.clone(),
            iat: past.timestamp(),
            exp: (past + Duration::minutes(30)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(security.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(service().verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn empty_secret_is_refused() {
        let mut security = AppConfig::development().security;
        security.jwt_secret.clear();
        assert!(matches!(JwtService::new(&security), Err(JwtError::MissingSecret)));
    }
}
