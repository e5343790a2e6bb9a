use serde_json::Value;

use super::types::{FilterCondition, FilterOp};

/// Where the filtered fields live in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereTarget {
    /// One typed column per field; parameters bind as native values.
    Column,
    /// Fields inside a JSONB column; parameters bind as JSONB.
    Document(&'static str),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterWhereOptions {
    /// Hide rows whose `deleted_at` is set.
    pub exclude_deleted: bool,
}

pub struct FilterWhere {
    target: WhereTarget,
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(target: WhereTarget, starting_param_index: usize) -> Self {
        Self {
            target,
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Render `conditions` as a SQL predicate. Placeholders start after
    /// `starting_param_index`; the returned values are in placeholder order.
    pub fn generate(
        conditions: &[FilterCondition],
        starting_param_index: usize,
        target: WhereTarget,
        options: FilterWhereOptions,
    ) -> (String, Vec<Value>) {
        let mut filter_where = Self::new(target, starting_param_index);
        filter_where.build(conditions, options)
    }

    fn build(&mut self, conditions: &[FilterCondition], options: FilterWhereOptions) -> (String, Vec<Value>) {
        let mut sql_conditions = vec![];
        if options.exclude_deleted {
            sql_conditions.push("\"deleted_at\" IS NULL".to_string());
        }
        for condition in conditions {
            sql_conditions.push(self.build_sql_condition(condition));
        }
        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        (where_clause, std::mem::take(&mut self.param_values))
    }

    fn build_sql_condition(&mut self, condition: &FilterCondition) -> String {
        let field = self.field_sql(&condition.field);
        match condition.operator {
            FilterOp::Eq if condition.data.is_null() && self.target == WhereTarget::Column => {
                format!("{} IS NULL", field)
            }
            FilterOp::Neq if condition.data.is_null() && self.target == WhereTarget::Column => {
                format!("{} IS NOT NULL", field)
            }
            FilterOp::In => {
                let values = match &condition.data {
                    Value::Array(values) => values.clone(),
                    single => vec![single.clone()],
                };
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                format!("{} IN ({})", field, params.join(", "))
            }
            op => format!("{} {} {}", field, op.to_sql(), self.param(condition.data.clone())),
        }
    }

    fn field_sql(&self, field: &str) -> String {
        // Field names are validated identifiers (see Filter::condition).
        match self.target {
            WhereTarget::Column => format!("\"{}\"", field),
            WhereTarget::Document(column) => format!("\"{}\" -> '{}'", column, field),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use serde_json::json;

    #[test]
    fn renders_column_conditions() {
        let filter = Filter::new().eq("status", "active").unwrap().gte("level", 10).unwrap();
        let (sql, params) = FilterWhere::generate(
            filter.conditions(),
            0,
            WhereTarget::Column,
            FilterWhereOptions::default(),
        );
        assert_eq!(sql, "\"status\" = $1 AND \"level\" >= $2");
        assert_eq!(params, vec![json!("active"), json!(10)]);
    }

    #[test]
    fn renders_document_conditions_after_offset() {
        let filter = Filter::new().eq("status", "retired").unwrap();
        let (sql, params) = FilterWhere::generate(
            filter.conditions(),
            2,
            WhereTarget::Document("body"),
            FilterWhereOptions { exclude_deleted: true },
        );
        assert_eq!(sql, "\"deleted_at\" IS NULL AND \"body\" -> 'status' = $3");
        assert_eq!(params, vec![json!("retired")]);
    }

    #[test]
    fn empty_filter_is_always_true() {
        let (sql, params) = FilterWhere::generate(&[], 0, WhereTarget::Column, FilterWhereOptions::default());
        assert_eq!(sql, "1=1");
        assert!(params.is_empty());
    }

    #[test]
    fn expands_in_and_null_checks() {
        let filter = Filter::new()
            .condition("role", FilterOp::In, json!(["admin", "moderator"]))
            .unwrap()
            .eq("last_login", Value::Null)
            .unwrap();
        let (sql, params) = FilterWhere::generate(
            filter.conditions(),
            0,
            WhereTarget::Column,
            FilterWhereOptions::default(),
        );
        assert_eq!(sql, "\"role\" IN ($1, $2) AND \"last_login\" IS NULL");
        assert_eq!(params.len(), 2);

        let empty_in = Filter::new().condition("role", FilterOp::In, json!([])).unwrap();
        let (sql, _) = FilterWhere::generate(
            empty_in.conditions(),
            0,
            WhereTarget::Column,
            FilterWhereOptions::default(),
        );
        assert_eq!(sql, "1=0");
    }
}
