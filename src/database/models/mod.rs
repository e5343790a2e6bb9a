pub mod hero;
pub mod user;

pub use hero::{Hero, HeroPatch, HeroStatus, NewHero};
pub use user::{FailedLogin, NewUser, User, UserPatch, UserProfile, UserRole, UserStatus};

use thiserror::Error;

/// Text that does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
