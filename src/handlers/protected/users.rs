// handlers/protected/users.rs - /users and /users/:id

use axum::extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    Path, Query, State,
};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::user::{MAX_EMAIL_LEN, MAX_NAME_LEN, MIN_NAME_LEN};
use crate::database::models::{UserPatch, UserProfile, UserRole, UserStatus};
use crate::database::StoreError;
use crate::error::ApiError;
use crate::filter::Filter;
use crate::handlers::public::heroes::page_params;
use crate::handlers::validation::Validator;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, Pagination};

const ROLES: &[&str] = &["admin", "user", "moderator"];
const STATUSES: &[&str] = &["active", "inactive", "suspended"];

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub role: Option<String>,
}

impl UpdateUserRequest {
    /// `role` and `status` changes are reserved for admins.
    pub fn into_patch(self, caller: &AuthUser) -> Result<UserPatch, ApiError> {
        if !caller.is_admin() && (self.role.is_some() || self.status.is_some()) {
            return Err(ApiError::forbidden("Only admins can change role or status"));
        }

        let mut v = Validator::new();
        let name = v.optional_text("name", self.name.as_deref(), MIN_NAME_LEN, MAX_NAME_LEN);
        let email = match self.email.as_deref() {
            Some(email) => v.email("email", Some(email), MAX_EMAIL_LEN),
            None => None,
        };
        let role = self.role.as_deref().and_then(|r| v.choice::<UserRole>("role", r, ROLES));
        let status = self
            .status
            .as_deref()
            .and_then(|s| v.choice::<UserStatus>("status", s, STATUSES));
        v.finish()?;

        if name.is_none() && email.is_none() && role.is_none() && status.is_none() {
            return Err(ApiError::bad_request("At least one field must be provided"));
        }
        Ok(UserPatch {
            name,
            email,
            role,
            status,
            ..Default::default()
        })
    }
}

/// GET /users - admin only
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> ApiResult<Vec<UserProfile>> {
    caller.require_admin()?;
    let Query(query) = query?;

    let mut v = Validator::new();
    let (page, limit) = page_params(&mut v, query.page, query.limit);
    let status = query
        .status
        .as_deref()
        .and_then(|s| v.choice::<UserStatus>("status", s, STATUSES));
    let role = query.role.as_deref().and_then(|r| v.choice::<UserRole>("role", r, ROLES));
    v.finish()?;

    let mut filter = Filter::new();
    if let Some(status) = status {
        filter = filter.eq("status", status.as_str())?;
    }
    if let Some(role) = role {
        filter = filter.eq("role", role.as_str())?;
    }

    let total = state.users.count(&filter).await?;
    let users = state.users.read(&filter.page(page, limit)?).await?;
    let profiles: Vec<UserProfile> = users.iter().map(|u| u.profile()).collect();
    Ok(ApiResponse::page(profiles, Pagination::new(page, limit, total)))
}

/// GET /users/:id - self or admin
pub async fn show(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<UserProfile> {
    let Path(id) = id?;
    caller.require_self_or_admin(id)?;

    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(user.profile()))
}

/// PATCH /users/:id - self or admin
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Path(id) = id?;
    caller.require_self_or_admin(id)?;
    let Json(req) = payload?;
    let patch = req.into_patch(&caller)?;

    let user = state
        .users
        .update(id, patch)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => ApiError::bad_request("Email already in use"),
            other => other.into(),
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    tracing::info!("User {} updated by {}", user.id, caller.id);
    Ok(ApiResponse::success(user.profile()).message("User updated successfully"))
}

/// DELETE /users/:id - admin only, never yourself
pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    caller.require_admin()?;
    let Path(id) = id?;
    if id == caller.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    if !state.users.delete(id).await? {
        return Err(ApiError::not_found("User not found"));
    }
    tracing::info!("User {} deleted by {}", id, caller.id);
    Ok(ApiResponse::success(json!({ "id": id })).message("User deleted successfully"))
}
