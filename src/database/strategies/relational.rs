use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::Query,
    FromRow, PgPool, Postgres,
};
use std::marker::PhantomData;
use uuid::Uuid;

use super::{Entity, StoreResult, Strategy};
use crate::database::models::{Hero, User};
use crate::filter::{Filter, FilterError, FilterWhere, FilterWhereOptions, WhereTarget};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// An entity mapped onto a typed table named after its collection.
pub trait Table: Entity + for<'r> FromRow<'r, PgRow> {
    /// Columns written on insert and update, in [`Table::bind_columns`] order.
    const COLUMNS: &'static [&'static str];
    /// Text and numeric columns that filters may reference.
    const FILTERABLE: &'static [&'static str];
    /// DDL run once at startup.
    const SCHEMA: &'static [&'static str];

    fn bind_columns<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q>;
}

impl Table for Hero {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "power",
        "status",
        "level",
        "skills",
        "created_at",
        "updated_at",
    ];
    const FILTERABLE: &'static [&'static str] = &["name", "power", "status", "level"];
    const SCHEMA: &'static [&'static str] = &[
        r#"CREATE TABLE IF NOT EXISTS "heroes" (
            "id" UUID PRIMARY KEY,
            "name" VARCHAR(100) NOT NULL,
            "power" VARCHAR(30) NOT NULL,
            "status" TEXT NOT NULL DEFAULT 'active' CHECK ("status" IN ('active', 'inactive', 'retired')),
            "level" SMALLINT NOT NULL CHECK ("level" BETWEEN 1 AND 100),
            "skills" TEXT[] NOT NULL DEFAULT '{}',
            "created_at" TIMESTAMPTZ NOT NULL,
            "updated_at" TIMESTAMPTZ NOT NULL
        )"#,
        r#"CREATE INDEX IF NOT EXISTS "heroes_status_idx" ON "heroes" ("status")"#,
        r#"CREATE INDEX IF NOT EXISTS "heroes_level_idx" ON "heroes" ("level")"#,
    ];

    fn bind_columns<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(&self.name)
            .bind(&self.power)
            .bind(self.status.as_str())
            .bind(i16::from(self.level))
            .bind(&self.skills)
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}

impl Table for User {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "password_hash",
        "role",
        "status",
        "last_login",
        "login_attempts",
        "locked_until",
        "created_at",
        "updated_at",
    ];
    const FILTERABLE: &'static [&'static str] = &["name", "email", "role", "status", "login_attempts"];
    const SCHEMA: &'static [&'static str] = &[
        r#"CREATE TABLE IF NOT EXISTS "users" (
            "id" UUID PRIMARY KEY,
            "name" VARCHAR(100) NOT NULL,
            "email" VARCHAR(255) NOT NULL,
            "password_hash" TEXT NOT NULL,
            "role" TEXT NOT NULL DEFAULT 'user' CHECK ("role" IN ('admin', 'user', 'moderator')),
            "status" TEXT NOT NULL DEFAULT 'active' CHECK ("status" IN ('active', 'inactive', 'suspended')),
            "last_login" TIMESTAMPTZ,
            "login_attempts" SMALLINT NOT NULL DEFAULT 0,
            "locked_until" TIMESTAMPTZ,
            "created_at" TIMESTAMPTZ NOT NULL,
            "updated_at" TIMESTAMPTZ NOT NULL,
            "deleted_at" TIMESTAMPTZ
        )"#,
        r#"CREATE UNIQUE INDEX IF NOT EXISTS "users_email_key" ON "users" ("email")"#,
        r#"CREATE INDEX IF NOT EXISTS "users_role_idx" ON "users" ("role")"#,
    ];

    fn bind_columns<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(&self.name)
            .bind(&self.email)
            .bind(&self.password_hash)
            .bind(self.role.as_str())
            .bind(self.status.as_str())
            .bind(self.last_login)
            .bind(i16::from(self.login_attempts))
            .bind(self.locked_until)
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}

/// Records stored as rows of a typed table.
pub struct RelationalStrategy<E> {
    pool: PgPool,
    _phantom: PhantomData<E>,
}

impl<E: Table> RelationalStrategy<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in E::SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Table '{}' ready", E::COLLECTION);
        Ok(())
    }
}

fn live_predicate<E: Entity>() -> &'static str {
    if E::SOFT_DELETE {
        r#" AND "deleted_at" IS NULL"#
    } else {
        ""
    }
}

fn where_clause<E: Table>(filter: &Filter) -> Result<(String, Vec<Value>), FilterError> {
    if let Some(condition) = filter
        .conditions()
        .iter()
        .find(|c| !E::FILTERABLE.contains(&c.field.as_str()))
    {
        return Err(FilterError::InvalidColumn(condition.field.clone()));
    }
    Ok(FilterWhere::generate(
        filter.conditions(),
        0,
        WhereTarget::Column,
        FilterWhereOptions {
            exclude_deleted: E::SOFT_DELETE,
        },
    ))
}

fn insert_sql<E: Table>() -> String {
    let columns: Vec<String> = E::COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
    let placeholders: Vec<String> = (1..=E::COLUMNS.len()).map(|i| format!("${}", i)).collect();
    format!(
        r#"INSERT INTO "{}" ({}) VALUES ({}) RETURNING *"#,
        E::COLLECTION,
        columns.join(", "),
        placeholders.join(", ")
    )
}

// `id` is always the first bound column, so `$1` doubles as the key.
fn update_sql<E: Table>() -> String {
    let assignments: Vec<String> = E::COLUMNS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, c)| format!("\"{}\" = ${}", c, i + 1))
        .collect();
    format!(
        r#"UPDATE "{}" SET {} WHERE "id" = $1 RETURNING *"#,
        E::COLLECTION,
        assignments.join(", ")
    )
}

/// Bind a filter value with its native Postgres type.
fn bind_value<'q>(query: PgQuery<'q>, value: Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s),
        // Arrays are expanded into one placeholder per element before binding.
        other => query.bind(other),
    }
}

#[async_trait]
impl<E: Table> Strategy<E> for RelationalStrategy<E> {
    fn name(&self) -> &'static str {
        "relational"
    }

    async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn create(&self, draft: E::Draft) -> StoreResult<E> {
        let entity = E::build(draft, Uuid::new_v4(), Utc::now());
        let sql = insert_sql::<E>();
        let row = entity.bind_columns(sqlx::query(&sql)).fetch_one(&self.pool).await?;
        Ok(E::from_row(&row)?)
    }

    async fn read(&self, filter: &Filter) -> StoreResult<Vec<E>> {
        let (where_clause, params) = where_clause::<E>(filter)?;
        let mut sql = format!(
            r#"SELECT * FROM "{}" WHERE {} ORDER BY "created_at", "id""#,
            E::COLLECTION,
            where_clause
        );
        let mut next_param = params.len();
        if filter.limit().is_some() {
            next_param += 1;
            sql.push_str(&format!(" LIMIT ${}", next_param));
        }
        next_param += 1;
        sql.push_str(&format!(" OFFSET ${}", next_param));

        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_value(query, param);
        }
        if let Some(limit) = filter.limit() {
            query = query.bind(i64::from(limit));
        }
        query = query.bind(i64::from(filter.offset()));

        let rows = query.fetch_all(&self.pool).await?;
        let entities = rows.iter().map(|row| E::from_row(row)).collect::<Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let (where_clause, params) = where_clause::<E>(filter)?;
        let sql = format!(r#"SELECT COUNT(*) FROM "{}" WHERE {}"#, E::COLLECTION, where_clause);
        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_value(query, param);
        }
        let row = query.fetch_one(&self.pool).await?;
        let count: i64 = sqlx::Row::try_get(&row, 0)?;
        Ok(count.max(0) as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<E>> {
        let sql = format!(
            r#"SELECT * FROM "{}" WHERE "id" = $1{}"#,
            E::COLLECTION,
            live_predicate::<E>()
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(|row| E::from_row(row)).transpose()?)
    }

    async fn update(&self, id: Uuid, patch: E::Patch) -> StoreResult<Option<E>> {
        let mut tx = self.pool.begin().await?;

        let select = format!(
            r#"SELECT * FROM "{}" WHERE "id" = $1{} FOR UPDATE"#,
            E::COLLECTION,
            live_predicate::<E>()
        );
        let Some(row) = sqlx::query(&select).bind(id).fetch_optional(&mut *tx).await? else {
            return Ok(None);
        };
        let mut entity = E::from_row(&row)?;
        entity.apply(patch, Utc::now());

        let sql = update_sql::<E>();
        let row = entity.bind_columns(sqlx::query(&sql)).fetch_one(&mut *tx).await?;
        let updated = E::from_row(&row)?;
        tx.commit().await?;

        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let sql = if E::SOFT_DELETE {
            format!(
                r#"UPDATE "{}" SET "deleted_at" = NOW() WHERE "id" = $1 AND "deleted_at" IS NULL"#,
                E::COLLECTION
            )
        } else {
            format!(r#"DELETE FROM "{}" WHERE "id" = $1"#, E::COLLECTION)
        };
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
