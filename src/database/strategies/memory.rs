use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Entity, StoreError, StoreResult, Strategy};
use crate::filter::Filter;

struct StoredDocument<E> {
    entity: E,
    document: Value,
    deleted_at: Option<DateTime<Utc>>,
}

impl<E> StoredDocument<E> {
    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// In-process document store. Each record is kept next to its JSON form,
/// which is what filters are evaluated against.
pub struct MemoryStrategy<E> {
    documents: RwLock<HashMap<Uuid, StoredDocument<E>>>,
}

impl<E: Entity> MemoryStrategy<E> {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn check_unique(
        documents: &HashMap<Uuid, StoredDocument<E>>,
        id: Uuid,
        document: &Value,
    ) -> StoreResult<()> {
        for field in E::UNIQUE_FIELDS {
            let Some(value) = document.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = documents
                .iter()
                .any(|(other_id, other)| *other_id != id && other.document.get(*field) == Some(value));
            if taken {
                return Err(StoreError::Duplicate(field.to_string()));
            }
        }
        Ok(())
    }

    fn sorted_matches<'a>(
        documents: &'a HashMap<Uuid, StoredDocument<E>>,
        filter: &Filter,
    ) -> Vec<&'a StoredDocument<E>> {
        let mut matches: Vec<_> = documents
            .values()
            .filter(|stored| stored.is_live() && filter.matches(&stored.document))
            .collect();
        matches.sort_by_key(|stored| (stored.entity.created_at(), stored.entity.id()));
        matches
    }
}

impl<E: Entity> Default for MemoryStrategy<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> Strategy<E> for MemoryStrategy<E> {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn create(&self, draft: E::Draft) -> StoreResult<E> {
        let entity = E::build(draft, Uuid::new_v4(), Utc::now());
        let document = serde_json::to_value(&entity)?;

        let mut documents = self.documents.write().await;
        Self::check_unique(&documents, entity.id(), &document)?;
        documents.insert(
            entity.id(),
            StoredDocument {
                entity: entity.clone(),
                document,
                deleted_at: None,
            },
        );
        Ok(entity)
    }

    async fn read(&self, filter: &Filter) -> StoreResult<Vec<E>> {
        let documents = self.documents.read().await;
        let limit = filter.limit().map_or(usize::MAX, |l| l as usize);
        Ok(Self::sorted_matches(&documents, filter)
            .into_iter()
            .skip(filter.offset() as usize)
            .take(limit)
            .map(|stored| stored.entity.clone())
            .collect())
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        let count = documents
            .values()
            .filter(|stored| stored.is_live() && filter.matches(&stored.document))
            .count();
        Ok(count as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<E>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&id)
            .filter(|stored| stored.is_live())
            .map(|stored| stored.entity.clone()))
    }

    async fn update(&self, id: Uuid, patch: E::Patch) -> StoreResult<Option<E>> {
        let mut documents = self.documents.write().await;
        let Some(mut entity) = documents
            .get(&id)
            .filter(|stored| stored.is_live())
            .map(|stored| stored.entity.clone())
        else {
            return Ok(None);
        };

        entity.apply(patch, Utc::now());
        let document = serde_json::to_value(&entity)?;
        Self::check_unique(&documents, id, &document)?;

        if let Some(stored) = documents.get_mut(&id) {
            stored.entity = entity.clone();
            stored.document = document;
        }
        Ok(Some(entity))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut documents = self.documents.write().await;
        if E::SOFT_DELETE {
            match documents.get_mut(&id) {
                Some(stored) if stored.is_live() => {
                    stored.deleted_at = Some(Utc::now());
                    Ok(true)
                }
                _ => Ok(false),
            }
        } else {
            Ok(documents.remove(&id).is_some())
        }
    }
}
