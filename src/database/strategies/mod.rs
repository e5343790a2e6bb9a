//! Storage strategies.
//!
//! Every backend implements [`Strategy`] for any [`Entity`], so a
//! [`Context`](crate::database::context::Context) can switch between an
//! in-memory document map, a PostgreSQL JSONB collection and typed
//! PostgreSQL tables without the callers noticing.

pub mod document;
pub mod memory;
pub mod relational;

pub use document::DocumentStrategy;
pub use memory::MemoryStrategy;
pub use relational::{RelationalStrategy, Table};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageBackend;
use crate::filter::{Filter, FilterError};

/// A record type that can be persisted by any strategy.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Validated input for a new record.
    type Draft: Send + 'static;
    /// Partial update.
    type Patch: Send + 'static;

    /// Collection (table) name.
    const COLLECTION: &'static str;
    /// Deletes only stamp `deleted_at` and hide the record.
    const SOFT_DELETE: bool = false;
    /// Fields whose values must be unique across the collection.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
    fn build(draft: Self::Draft, id: Uuid, now: DateTime<Utc>) -> Self;
    fn apply(&mut self, patch: Self::Patch, now: DateTime<Utc>);
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A record with this {0} already exists")]
    Duplicate(String),

    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            // 23505 = unique_violation
            if db_err.code().as_deref() == Some("23505") {
                let field = db_err
                    .constraint()
                    .and_then(unique_field_from_constraint)
                    .unwrap_or("unique field")
                    .to_string();
                return StoreError::Duplicate(field);
            }
        }
        StoreError::Sqlx(err)
    }
}

// Unique indexes are named `<table>_<field>_key`.
fn unique_field_from_constraint(constraint: &str) -> Option<&str> {
    let trimmed = constraint.strip_suffix("_key")?;
    trimmed.rsplit('_').next()
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Strategy<E: Entity>: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    async fn is_connected(&self) -> bool;

    async fn create(&self, draft: E::Draft) -> StoreResult<E>;

    /// Live records matching the filter, ordered by creation time.
    async fn read(&self, filter: &Filter) -> StoreResult<Vec<E>>;

    /// Number of live records matching the filter conditions, ignoring its page.
    async fn count(&self, filter: &Filter) -> StoreResult<u64>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<E>>;

    /// `None` when no live record has this id.
    async fn update(&self, id: Uuid, patch: E::Patch) -> StoreResult<Option<E>>;

    /// `false` when no live record has this id.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// Build the configured strategy for `E`, creating its tables when needed.
pub async fn build_strategy<E: Table>(
    backend: StorageBackend,
    pool: Option<&PgPool>,
) -> StoreResult<Arc<dyn Strategy<E>>> {
    let require_pool = || {
        pool.cloned().ok_or_else(|| {
            StoreError::Unavailable(format!(
                "{} backend for '{}' requires a database connection",
                backend,
                E::COLLECTION
            ))
        })
    };

    let strategy: Arc<dyn Strategy<E>> = match backend {
        StorageBackend::Memory => Arc::new(MemoryStrategy::<E>::new()),
        StorageBackend::Document => {
            let strategy = DocumentStrategy::<E>::new(require_pool()?);
            strategy.ensure_collection().await?;
            Arc::new(strategy)
        }
        StorageBackend::Relational => {
            let strategy = RelationalStrategy::<E>::new(require_pool()?);
            strategy.ensure_schema().await?;
            Arc::new(strategy)
        }
    };

    tracing::info!("Using {} strategy for '{}'", strategy.name(), E::COLLECTION);
    Ok(strategy)
}
