use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use std::marker::PhantomData;
use uuid::Uuid;

use super::{Entity, StoreResult, Strategy};
use crate::filter::{Filter, FilterWhere, FilterWhereOptions, WhereTarget};

const BODY: &str = "body";

/// Records stored whole as JSONB documents in `<collection>_documents`.
pub struct DocumentStrategy<E> {
    pool: PgPool,
    table: String,
    _phantom: PhantomData<E>,
}

impl<E: Entity> DocumentStrategy<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: table_name::<E>(),
            _phantom: PhantomData,
        }
    }

    /// Create the collection table and its unique indexes if missing.
    pub async fn ensure_collection(&self) -> StoreResult<()> {
        for statement in collection_ddl::<E>() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        tracing::debug!("Document collection '{}' ready", self.table);
        Ok(())
    }

    fn where_clause(&self, filter: &Filter, starting_param_index: usize) -> (String, Vec<Value>) {
        FilterWhere::generate(
            filter.conditions(),
            starting_param_index,
            WhereTarget::Document(BODY),
            FilterWhereOptions { exclude_deleted: true },
        )
    }
}

fn table_name<E: Entity>() -> String {
    format!("{}_documents", E::COLLECTION)
}

fn collection_ddl<E: Entity>() -> Vec<String> {
    let table = table_name::<E>();
    let mut statements = vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{table}" (
                "id" UUID PRIMARY KEY,
                "{BODY}" JSONB NOT NULL,
                "created_at" TIMESTAMPTZ NOT NULL,
                "updated_at" TIMESTAMPTZ NOT NULL,
                "deleted_at" TIMESTAMPTZ
            )"#
        ),
        format!(r#"CREATE INDEX IF NOT EXISTS "{table}_created_at_idx" ON "{table}" ("created_at", "id")"#),
    ];
    for field in E::UNIQUE_FIELDS {
        statements.push(format!(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "{table}_{field}_key" ON "{table}" (("{BODY}" ->> '{field}'))"#
        ));
    }
    statements
}

#[async_trait]
impl<E: Entity> Strategy<E> for DocumentStrategy<E> {
    fn name(&self) -> &'static str {
        "document"
    }

    async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn create(&self, draft: E::Draft) -> StoreResult<E> {
        let entity = E::build(draft, Uuid::new_v4(), Utc::now());
        let body = serde_json::to_value(&entity)?;

        let sql = format!(
            r#"INSERT INTO "{}" ("id", "{BODY}", "created_at", "updated_at") VALUES ($1, $2, $3, $3)"#,
            self.table
        );
        sqlx::query(&sql)
            .bind(entity.id())
            .bind(body)
            .bind(entity.created_at())
            .execute(&self.pool)
            .await?;
        Ok(entity)
    }

    async fn read(&self, filter: &Filter) -> StoreResult<Vec<E>> {
        let (where_clause, params) = self.where_clause(filter, 0);
        let mut sql = format!(
            r#"SELECT "{BODY}" FROM "{}" WHERE {} ORDER BY "created_at", "id""#,
            self.table, where_clause
        );
        let mut next_param = params.len();
        if filter.limit().is_some() {
            next_param += 1;
            sql.push_str(&format!(" LIMIT ${}", next_param));
        }
        next_param += 1;
        sql.push_str(&format!(" OFFSET ${}", next_param));

        let mut query = sqlx::query_scalar::<_, Json<E>>(&sql);
        for param in params {
            query = query.bind(param);
        }
        if let Some(limit) = filter.limit() {
            query = query.bind(i64::from(limit));
        }
        query = query.bind(i64::from(filter.offset()));

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Json(entity)| entity).collect())
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let (where_clause, params) = self.where_clause(filter, 0);
        let sql = format!(r#"SELECT COUNT(*) FROM "{}" WHERE {}"#, self.table, where_clause);
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for param in params {
            query = query.bind(param);
        }
        let count = query.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<E>> {
        let sql = format!(
            r#"SELECT "{BODY}" FROM "{}" WHERE "id" = $1 AND "deleted_at" IS NULL"#,
            self.table
        );
        let row = sqlx::query_scalar::<_, Json<E>>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(entity)| entity))
    }

    async fn update(&self, id: Uuid, patch: E::Patch) -> StoreResult<Option<E>> {
        let mut tx = self.pool.begin().await?;

        let select = format!(
            r#"SELECT "{BODY}" FROM "{}" WHERE "id" = $1 AND "deleted_at" IS NULL FOR UPDATE"#,
            self.table
        );
        let Some(Json(mut entity)) = sqlx::query_scalar::<_, Json<E>>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let now = Utc::now();
        entity.apply(patch, now);
        let body = serde_json::to_value(&entity)?;

        let update = format!(
            r#"UPDATE "{}" SET "{BODY}" = $2, "updated_at" = $3 WHERE "id" = $1"#,
            self.table
        );
        sqlx::query(&update)
            .bind(id)
            .bind(body)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(entity))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let sql = if E::SOFT_DELETE {
            format!(
                r#"UPDATE "{}" SET "deleted_at" = NOW() WHERE "id" = $1 AND "deleted_at" IS NULL"#,
                self.table
            )
        } else {
            format!(r#"DELETE FROM "{}" WHERE "id" = $1"#, self.table)
        };
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Hero, User};

    #[test]
    fn collection_tables_are_suffixed() {
        assert_eq!(table_name::<Hero>(), "heroes_documents");
        assert_eq!(table_name::<User>(), "users_documents");
    }

    #[test]
    fn unique_fields_get_expression_indexes() {
        let ddl = collection_ddl::<User>();
        assert_eq!(ddl.len(), 3);
        assert!(ddl[2].contains(r#""users_documents_email_key""#));
        assert!(ddl[2].contains(r#"("body" ->> 'email')"#));

        assert_eq!(collection_ddl::<Hero>().len(), 2);
    }
}
