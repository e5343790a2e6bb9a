use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{user::normalize_email, User};
use super::strategies::{Entity, StoreResult, Strategy};
use crate::filter::Filter;

/// Routes every data operation for `E` to the currently selected strategy.
///
/// The strategy can be swapped at runtime. Each call takes a snapshot of the
/// current strategy, so an operation in flight finishes on the backend it
/// started on.
pub struct Context<E: Entity> {
    strategy: RwLock<Arc<dyn Strategy<E>>>,
}

impl<E: Entity> Context<E> {
    pub fn new(strategy: Arc<dyn Strategy<E>>) -> Self {
        Self {
            strategy: RwLock::new(strategy),
        }
    }

    pub fn set_strategy(&self, strategy: Arc<dyn Strategy<E>>) {
        let mut current = self.strategy.write().unwrap_or_else(|p| p.into_inner());
        info!(
            "Switching '{}' strategy from {} to {}",
            E::COLLECTION,
            current.name(),
            strategy.name()
        );
        *current = strategy;
    }

    pub fn strategy(&self) -> Arc<dyn Strategy<E>> {
        self.strategy.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy().name()
    }

    pub async fn is_connected(&self) -> bool {
        self.strategy().is_connected().await
    }

    pub async fn create(&self, draft: E::Draft) -> StoreResult<E> {
        let strategy = self.strategy();
        debug!("{}: create in '{}'", strategy.name(), E::COLLECTION);
        strategy.create(draft).await
    }

    pub async fn read(&self, filter: &Filter) -> StoreResult<Vec<E>> {
        let strategy = self.strategy();
        debug!("{}: read '{}' {:?}", strategy.name(), E::COLLECTION, filter);
        strategy.read(filter).await
    }

    pub async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.strategy().count(filter).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<E>> {
        self.strategy().find_by_id(id).await
    }

    pub async fn update(&self, id: Uuid, patch: E::Patch) -> StoreResult<Option<E>> {
        let strategy = self.strategy();
        debug!("{}: update {} in '{}'", strategy.name(), id, E::COLLECTION);
        strategy.update(id, patch).await
    }

    pub async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let strategy = self.strategy();
        debug!("{}: delete {} from '{}'", strategy.name(), id, E::COLLECTION);
        strategy.delete(id).await
    }
}

impl Context<User> {
    /// Live user with this email, compared case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let filter = Filter::new().eq("email", normalize_email(email))?.page(1, 1)?;
        Ok(self.read(&filter).await?.into_iter().next())
    }
}
