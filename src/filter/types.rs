use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::error::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Neq,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
    #[serde(rename = "$in")] In,
}

impl FilterOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Neq => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::In => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOp,
    pub data: Value,
}

impl FilterCondition {
    /// Evaluate the condition against a serialized record.
    pub fn matches(&self, document: &Value) -> bool {
        let actual = document.get(&self.field).unwrap_or(&Value::Null);
        match self.operator {
            FilterOp::Eq => actual == &self.data,
            FilterOp::Neq => actual != &self.data,
            FilterOp::Gt => compare(actual, &self.data) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(compare(actual, &self.data), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => compare(actual, &self.data) == Some(Ordering::Less),
            FilterOp::Lte => matches!(compare(actual, &self.data), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::In => match &self.data {
                Value::Array(values) => values.iter().any(|v| v == actual),
                single => single == actual,
            },
        }
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Conditions plus an optional page, consumed by every storage strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<FilterCondition>,
    limit: Option<u32>,
    offset: u32,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, field: &str, operator: FilterOp, data: impl Into<Value>) -> Result<Self, FilterError> {
        validate_field_name(field)?;
        let data = data.into();
        if operator == FilterOp::In && !data.is_array() {
            return Err(FilterError::InvalidOperatorData("$in requires an array".to_string()));
        }
        self.conditions.push(FilterCondition {
            field: field.to_string(),
            operator,
            data,
        });
        Ok(self)
    }

    pub fn eq(self, field: &str, data: impl Into<Value>) -> Result<Self, FilterError> {
        self.condition(field, FilterOp::Eq, data)
    }

    pub fn gte(self, field: &str, data: impl Into<Value>) -> Result<Self, FilterError> {
        self.condition(field, FilterOp::Gte, data)
    }

    /// One-based page number and page size.
    pub fn page(mut self, page: u32, limit: u32) -> Result<Self, FilterError> {
        if page == 0 {
            return Err(FilterError::InvalidLimit("Page must be at least 1".to_string()));
        }
        if limit == 0 {
            return Err(FilterError::InvalidLimit("Limit must be at least 1".to_string()));
        }
        self.limit = Some(limit);
        self.offset = (page - 1).saturating_mul(limit);
        Ok(self)
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }
}

fn validate_field_name(field: &str) -> Result<(), FilterError> {
    let valid = !field.is_empty()
        && field.len() <= 63
        && field.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidColumn(field.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_equality_and_minimum() {
        let hero = json!({ "status": "active", "level": 42 });
        let filter = Filter::new().eq("status", "active").unwrap().gte("level", 40).unwrap();
        assert!(filter.matches(&hero));

        let stricter = Filter::new().gte("level", 43).unwrap();
        assert!(!stricter.matches(&hero));
    }

    #[test]
    fn in_operator_requires_array() {
        assert!(Filter::new().condition("role", FilterOp::In, "admin").is_err());
        let filter = Filter::new().condition("role", FilterOp::In, json!(["admin", "moderator"])).unwrap();
        assert!(filter.matches(&json!({ "role": "moderator" })));
        assert!(!filter.matches(&json!({ "role": "user" })));
    }

    #[test]
    fn missing_field_never_compares() {
        let filter = Filter::new().gte("level", 1).unwrap();
        assert!(!filter.matches(&json!({ "name": "no level" })));
    }

    #[test]
    fn rejects_unsafe_field_names() {
        assert_eq!(
            Filter::new().eq("status; DROP TABLE users", "x").unwrap_err(),
            FilterError::InvalidColumn("status; DROP TABLE users".to_string())
        );
        assert!(Filter::new().eq("1status", "x").is_err());
    }

    #[test]
    fn page_translates_to_offset() {
        let filter = Filter::new().page(3, 10).unwrap();
        assert_eq!(filter.limit(), Some(10));
        assert_eq!(filter.offset(), 20);
        assert!(Filter::new().page(0, 10).is_err());
        assert!(Filter::new().page(1, 0).is_err());
    }
}
