use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{User, UserRole};
use crate::error::ApiError;

/// The caller behind a verified token, injected into request extensions.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }

    /// Admins may act on anyone; everyone else only on themselves.
    pub fn require_self_or_admin(&self, id: Uuid) -> Result<(), ApiError> {
        if self.is_admin() || self.id == id {
            Ok(())
        } else {
            Err(ApiError::forbidden("Access denied"))
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Verifies the bearer token, then loads its user so that deleted or
/// deactivated accounts lose access immediately.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).map_err(|msg| {
        tracing::warn!("Rejected request to {}: {}", request.uri().path(), msg);
        ApiError::unauthorized(msg)
    })?;

    let claims = state.jwt.verify(&token)?;

    let user = match state.users.find_by_id(claims.sub).await? {
        Some(user) if user.is_active() => user,
        Some(user) => {
            tracing::warn!("Token presented for {} user {}", user.status, user.id);
            return Err(ApiError::unauthorized("Account is disabled"));
        }
        None => {
            tracing::warn!("Token presented for unknown user {}", claims.sub);
            return Err(ApiError::unauthorized("User not found"));
        }
    };

    request.extensions_mut().insert(AuthUser::from(&user));
    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, &'static str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty JWT token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_jwt_from_headers(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi".to_string()));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(extract_jwt_from_headers(&HeaderMap::new()), Err("Missing Authorization header"));
        assert_eq!(extract_jwt_from_headers(&headers("Bearer   ")), Err("Empty JWT token"));
        assert_eq!(
            extract_jwt_from_headers(&headers("Basic dXNlcjpwYXNz")),
            Err("Authorization header must use Bearer token format")
        );
    }

    #[test]
    fn self_or_admin() {
        let me = AuthUser {
            id: Uuid::new_v4(),
            email: "me@example.com".to_string(),
            role: UserRole::User,
        };
        assert!(me.require_self_or_admin(me.id).is_ok());
        assert!(me.require_self_or_admin(Uuid::new_v4()).is_err());
        assert!(me.require_admin().is_err());

        let admin = AuthUser {
            role: UserRole::Admin,
            ..me
        };
        assert!(admin.require_self_or_admin(Uuid::new_v4()).is_ok());
    }
}
