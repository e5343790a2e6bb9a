// handlers/protected/auth.rs - GET /auth/me

use axum::extract::State;
use axum::Extension;

use crate::app::AppState;
use crate::database::models::UserProfile;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /auth/me - profile of the token's user
pub async fn me(State(state): State<AppState>, Extension(caller): Extension<AuthUser>) -> ApiResult<UserProfile> {
    let user = state
        .users
        .find_by_id(caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(user.profile()))
}
