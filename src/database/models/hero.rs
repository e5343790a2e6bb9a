use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;
use crate::database::strategies::Entity;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_POWER_LEN: usize = 30;
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeroStatus {
    #[default]
    Active,
    Inactive,
    Retired,
}

impl HeroStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeroStatus::Active => "active",
            HeroStatus::Inactive => "inactive",
            HeroStatus::Retired => "retired",
        }
    }
}

impl fmt::Display for HeroStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeroStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(HeroStatus::Active),
            "inactive" => Ok(HeroStatus::Inactive),
            "retired" => Ok(HeroStatus::Retired),
            other => Err(ParseEnumError::new("hero status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hero {
    pub id: Uuid,
    pub name: String,
    pub power: String,
    pub status: HeroStatus,
    pub level: u8,
    pub skills: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hero {
    pub fn is_active(&self) -> bool {
        self.status == HeroStatus::Active
    }
}

/// Validated input for a new hero.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHero {
    pub name: String,
    pub power: String,
    pub status: HeroStatus,
    pub level: u8,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeroPatch {
    pub name: Option<String>,
    pub power: Option<String>,
    pub status: Option<HeroStatus>,
    pub level: Option<u8>,
    pub skills: Option<Vec<String>>,
}

impl HeroPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.power.is_none()
            && self.status.is_none()
            && self.level.is_none()
            && self.skills.is_none()
    }
}

// Names are stored lowercased so lookups are case-insensitive.
fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Entity for Hero {
    type Draft = NewHero;
    type Patch = HeroPatch;

    const COLLECTION: &'static str = "heroes";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn build(draft: NewHero, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: normalize_name(&draft.name),
            power: draft.power.trim().to_string(),
            status: draft.status,
            level: draft.level,
            skills: draft.skills,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, patch: HeroPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = normalize_name(&name);
        }
        if let Some(power) = patch.power {
            self.power = power.trim().to_string();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(level) = patch.level {
            self.level = level;
        }
        if let Some(skills) = patch.skills {
            self.skills = skills;
        }
        self.updated_at = now;
    }
}

impl<'r> FromRow<'r, PgRow> for Hero {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;
        let level: i16 = row.try_get("level")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            power: row.try_get("power")?,
            status: status.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            level: u8::try_from(level).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            skills: row.try_get("skills")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
