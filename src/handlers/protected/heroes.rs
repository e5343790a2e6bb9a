// handlers/protected/heroes.rs - POST /heroes, PATCH /heroes/:id, DELETE /heroes/:id

use axum::extract::{
    rejection::{JsonRejection, PathRejection},
    Path, State,
};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::hero::{MAX_LEVEL, MAX_NAME_LEN, MAX_POWER_LEN, MIN_LEVEL};
use crate::database::models::{Hero, HeroPatch, HeroStatus, NewHero};
use crate::error::ApiError;
use crate::handlers::validation::Validator;
use crate::middleware::{ApiResponse, ApiResult};

const STATUSES: &[&str] = &["active", "inactive", "retired"];

/// Body of both create and update; presence rules differ.
#[derive(Debug, Default, Deserialize)]
pub struct HeroRequest {
    pub name: Option<String>,
    pub power: Option<String>,
    pub status: Option<String>,
    pub level: Option<i64>,
    pub skills: Option<Vec<String>>,
}

impl HeroRequest {
    fn validate_common(&self, v: &mut Validator) -> (Option<HeroStatus>, Option<u8>, Option<Vec<String>>) {
        let status = self.status.as_deref().and_then(|s| v.choice("status", s, STATUSES));
        let level = self
            .level
            .and_then(|l| v.range("level", l, i64::from(MIN_LEVEL), i64::from(MAX_LEVEL)))
            .and_then(|l| u8::try_from(l).ok());
        let skills = self.skills.as_ref().and_then(|skills| {
            let trimmed: Vec<String> = skills.iter().map(|s| s.trim().to_string()).collect();
            if trimmed.iter().any(String::is_empty) {
                v.error("skills", "Skills cannot be empty");
                None
            } else {
                Some(trimmed)
            }
        });
        (status, level, skills)
    }

    pub fn into_new_hero(self) -> Result<NewHero, ApiError> {
        let mut v = Validator::new();
        let name = v.text("name", self.name.as_deref(), 1, MAX_NAME_LEN);
        let power = v.text("power", self.power.as_deref(), 1, MAX_POWER_LEN);
        let (status, level, skills) = self.validate_common(&mut v);
        v.finish()?;

        let (Some(name), Some(power)) = (name, power) else {
            return Err(ApiError::bad_request("Name and power are required"));
        };
        Ok(NewHero {
            name,
            power,
            status: status.unwrap_or_default(),
            level: level.unwrap_or(MIN_LEVEL),
            skills: skills.unwrap_or_default(),
        })
    }

    pub fn into_patch(self) -> Result<HeroPatch, ApiError> {
        let mut v = Validator::new();
        let name = v.optional_text("name", self.name.as_deref(), 1, MAX_NAME_LEN);
        let power = v.optional_text("power", self.power.as_deref(), 1, MAX_POWER_LEN);
        let (status, level, skills) = self.validate_common(&mut v);
        v.finish()?;

        let patch = HeroPatch {
            name,
            power,
            status,
            level,
            skills,
        };
        if patch.is_empty() {
            return Err(ApiError::bad_request("At least one field must be provided"));
        }
        Ok(patch)
    }
}

/// POST /heroes
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<HeroRequest>, JsonRejection>,
) -> ApiResult<Hero> {
    let Json(req) = payload?;
    let hero = state.heroes.create(req.into_new_hero()?).await?;
    tracing::info!("Created hero {} ({})", hero.id, hero.name);
    Ok(ApiResponse::created(hero).message("Hero created successfully"))
}

/// PATCH /heroes/:id
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<HeroRequest>, JsonRejection>,
) -> ApiResult<Hero> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let patch = req.into_patch()?;

    let hero = state
        .heroes
        .update(id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Hero not found"))?;
    Ok(ApiResponse::success(hero).message("Hero updated successfully"))
}

/// DELETE /heroes/:id
pub async fn delete(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    if !state.heroes.delete(id).await? {
        return Err(ApiError::not_found("Hero not found"));
    }
    tracing::info!("Deleted hero {}", id);
    Ok(ApiResponse::success(json!({ "id": id })).message("Hero deleted successfully"))
}
