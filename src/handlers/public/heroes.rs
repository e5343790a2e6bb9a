// handlers/public/heroes.rs - GET /heroes and GET /heroes/:id

use axum::extract::{
    rejection::{PathRejection, QueryRejection},
    Path, Query, State,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::hero::{MAX_LEVEL, MIN_LEVEL};
use crate::database::models::{Hero, HeroStatus};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::handlers::validation::Validator;
use crate::middleware::{ApiResponse, ApiResult, Pagination};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListHeroesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    /// Minimum level.
    pub level: Option<i64>,
}

/// Validated `page` and `limit` query parameters.
pub fn page_params(v: &mut Validator, page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1);
    if page < 1 {
        v.error("page", "Page must be at least 1");
    }
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        v.error("limit", format!("Limit must be between 1 and {}", MAX_PAGE_LIMIT));
    }
    (page, limit)
}

/// GET /heroes - paginated list filtered by `status` and minimum `level`
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListHeroesQuery>, QueryRejection>,
) -> ApiResult<Vec<Hero>> {
    let Query(query) = query?;

    let mut v = Validator::new();
    let (page, limit) = page_params(&mut v, query.page, query.limit);
    let status = query
        .status
        .as_deref()
        .and_then(|s| v.choice::<HeroStatus>("status", s, &["active", "inactive", "retired"]));
    let level = query
        .level
        .and_then(|l| v.range("level", l, i64::from(MIN_LEVEL), i64::from(MAX_LEVEL)));
    v.finish()?;

    let mut filter = Filter::new();
    if let Some(status) = status {
        filter = filter.eq("status", status.as_str())?;
    }
    if let Some(level) = level {
        filter = filter.gte("level", level)?;
    }

    let total = state.heroes.count(&filter).await?;
    let heroes = state.heroes.read(&filter.page(page, limit)?).await?;
    Ok(ApiResponse::page(heroes, Pagination::new(page, limit, total)))
}

/// GET /heroes/:id
pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Hero> {
    let Path(id) = id?;
    let hero = state
        .heroes
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Hero not found"))?;
    Ok(ApiResponse::success(hero))
}
