//! Storage templates: the record-level surface a store exposes to
//! repositories.

pub mod memory;

pub use memory::InMemoryTemplate;

use crate::core::{MapError, Result};
use crate::query::{DeleteQuery, SelectQuery};
use crate::record::Record;
use async_trait::async_trait;
use std::time::Duration;

/// Synchronous storage template.
pub trait StorageTemplate: Send + Sync {
    /// Stores a new record and returns it as stored.
    fn insert(&self, record: Record) -> Result<Record>;

    /// Stores a new record that expires after `ttl`.
    fn insert_with_ttl(&self, record: Record, ttl: Duration) -> Result<Record>;

    /// Replaces an existing record and returns it as stored.
    fn update(&self, record: Record) -> Result<Record>;

    fn delete(&self, query: DeleteQuery) -> Result<()>;

    fn select(&self, query: &SelectQuery) -> Result<Vec<Record>>;

    /// At most one matching record; more than one is `NonUniqueResult`.
    fn single_result(&self, query: &SelectQuery) -> Result<Option<Record>> {
        single(self.select(query)?, query)
    }
}

/// Asynchronous storage template.
#[async_trait]
pub trait AsyncStorageTemplate: Send + Sync {
    async fn insert(&self, record: Record) -> Result<Record>;

    async fn insert_with_ttl(&self, record: Record, ttl: Duration) -> Result<Record>;

    async fn update(&self, record: Record) -> Result<Record>;

    async fn delete(&self, query: DeleteQuery) -> Result<()>;

    async fn select(&self, query: &SelectQuery) -> Result<Vec<Record>>;

    async fn single_result(&self, query: &SelectQuery) -> Result<Option<Record>> {
        single(self.select(query).await?, query)
    }
}

fn single(mut records: Vec<Record>, query: &SelectQuery) -> Result<Option<Record>> {
    if records.len() > 1 {
        return Err(MapError::NonUniqueResult(query.collection.clone()));
    }
    Ok(records.pop())
}
