// handlers/validation.rs - request field checks shared by handlers

use crate::error::{ApiError, FieldErrors};

/// Collects per-field problems so a client sees all of them at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_insert_with(|| message.into());
    }

    /// Trimmed, required text with a character-count range.
    pub fn text(&mut self, field: &str, value: Option<&str>, min: usize, max: usize) -> Option<String> {
        let Some(value) = value.map(str::trim) else {
            self.error(field, format!("{} is required", label(field)));
            return None;
        };
        self.bounded(field, value, min, max)
    }

    /// Same as [`Validator::text`] but absence is fine.
    pub fn optional_text(&mut self, field: &str, value: Option<&str>, min: usize, max: usize) -> Option<String> {
        value.and_then(|v| self.bounded(field, v.trim(), min, max))
    }

    fn bounded(&mut self, field: &str, value: &str, min: usize, max: usize) -> Option<String> {
        let len = value.chars().count();
        if len == 0 && min > 0 {
            self.error(field, format!("{} is required", label(field)));
            None
        } else if len < min {
            self.error(field, format!("{} must be at least {} characters", label(field), min));
            None
        } else if len > max {
            self.error(field, format!("{} must be at most {} characters", label(field), max));
            None
        } else {
            Some(value.to_string())
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>, max: usize) -> Option<String> {
        let email = self.text(field, value, 1, max)?;
        if is_valid_email(&email) {
            Some(email)
        } else {
            self.error(field, "Invalid email format");
            None
        }
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) -> Option<i64> {
        if (min..=max).contains(&value) {
            Some(value)
        } else {
            self.error(field, format!("{} must be between {} and {}", label(field), min, max));
            None
        }
    }

    /// Parse one of a fixed set of lowercase values.
    pub fn choice<T: std::str::FromStr>(&mut self, field: &str, value: &str, allowed: &[&str]) -> Option<T> {
        match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.error(field, format!("{} must be one of: {}", label(field), allowed.join(", ")));
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error("Validation failed", Some(self.errors)))
        }
    }
}

fn label(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Pragmatic check: one `@`, non-empty local part, dotted domain, no spaces.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty())
}
