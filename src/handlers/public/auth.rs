// handlers/public/auth.rs - POST /auth/register and POST /auth/login

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::user::{MAX_EMAIL_LEN, MAX_NAME_LEN, MIN_NAME_LEN, MIN_PASSWORD_LEN};
use crate::database::models::UserProfile;
use crate::error::ApiError;
use crate::handlers::validation::Validator;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::LoginResponse;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /auth/register - create an active `user` account
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Json(req) = payload?;

    let mut v = Validator::new();
    let name = v.text("name", req.name.as_deref(), MIN_NAME_LEN, MAX_NAME_LEN);
    let email = v.email("email", req.email.as_deref(), MAX_EMAIL_LEN);
    let password = match req.password.as_deref() {
        Some(p) if p.chars().count() >= MIN_PASSWORD_LEN => Some(p),
        Some(_) => {
            v.error("password", format!("Password must be at least {} characters", MIN_PASSWORD_LEN));
            None
        }
        None => {
            v.error("password", "Password is required");
            None
        }
    };
    v.finish()?;
    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(ApiError::bad_request("Invalid registration data"));
    };

    let user = state.auth.register(&name, &email, password).await?;
    Ok(ApiResponse::created(user.profile()).message("User registered successfully"))
}

/// POST /auth/login - exchange credentials for a JWT
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(req) = payload?;

    let mut v = Validator::new();
    let email = v.text("email", req.email.as_deref(), 1, MAX_EMAIL_LEN);
    if req.password.as_deref().map_or(true, str::is_empty) {
        v.error("password", "Password is required");
    }
    v.finish()?;
    let (Some(email), Some(password)) = (email, req.password) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let response = state.auth.login(&email, &password).await?;
    Ok(ApiResponse::success(response).message("Login successful"))
}
