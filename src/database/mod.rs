pub mod context;
pub mod manager;
pub mod models;
pub mod strategies;

pub use context::Context;
pub use manager::{DatabaseError, DatabaseManager};
pub use strategies::{build_strategy, Entity, StoreError, StoreResult, Strategy};
