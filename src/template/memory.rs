use super::{AsyncStorageTemplate, StorageTemplate};
use crate::config::MapperConfig;
use crate::core::{MapError, Result, Value};
use crate::model::EntityRegistry;
use crate::query::{Condition, DeleteQuery, PatternCache, SelectQuery, SortDirection};
use crate::record::{Record, RecordValue};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{Level, event};

/// Entry name used as the key when nothing else is known.
pub const DEFAULT_KEY: &str = "id";

struct StoredRecord {
    record: Record,
    expires_at: Option<Instant>,
}

impl StoredRecord {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Record store kept in process memory.
///
/// Records are grouped by collection name and keyed by one scalar entry:
/// the one set with [`InMemoryTemplate::key_for`], else the id field of the
/// entity registered under the collection name, else `id`.
pub struct InMemoryTemplate {
    collections: RwLock<HashMap<String, Vec<StoredRecord>>>,
    keys: RwLock<HashMap<String, String>>,
    entities: Option<Arc<EntityRegistry>>,
    patterns: PatternCache,
}

impl InMemoryTemplate {
    pub fn new() -> Self {
        Self::with_config(&MapperConfig::default())
    }

    pub fn with_config(config: &MapperConfig) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            entities: None,
            patterns: PatternCache::new(config.like_cache_capacity),
        }
    }

    /// Resolves collection keys from entity id fields.
    pub fn with_registry(mut self, entities: Arc<EntityRegistry>) -> Self {
        self.entities = Some(entities);
        self
    }

    /// Keys `collection` on the entry named `entry`.
    pub fn key_for(self, collection: impl Into<String>, entry: impl Into<String>) -> Self {
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(collection.into(), entry.into());
        }
        self
    }

    /// Live records of a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let now = Instant::now();
        Ok(self
            .collections
            .read()?
            .get(collection)
            .map(|records| records.iter().filter(|stored| stored.is_live(now)).count())
            .unwrap_or(0))
    }

    fn key_name(&self, collection: &str) -> Result<String> {
        if let Some(key) = self.keys.read()?.get(collection) {
            return Ok(key.clone());
        }
        if let Some(entities) = &self.entities {
            if let Ok(metadata) = entities.find_by_name(collection) {
                if let Some(id) = metadata.id_field() {
                    return Ok(id.record_name.clone());
                }
            }
        }
        Ok(DEFAULT_KEY.to_string())
    }

    fn key_of(record: &Record, key: &str) -> Option<Value> {
        match record.find(key).map(|entry| &entry.value) {
            Some(RecordValue::Scalar(value)) if !value.is_null() => Some(value.clone()),
            _ => None,
        }
    }

    fn store(&self, record: Record, ttl: Option<Duration>) -> Result<Record> {
        let key = self.key_name(record.name())?;
        let now = Instant::now();
        let mut collections = self.collections.write()?;
        let records = collections.entry(record.name().to_string()).or_default();
        records.retain(|stored| stored.is_live(now));

        if let Some(id) = Self::key_of(&record, &key) {
            let taken = records
                .iter()
                .any(|stored| Self::key_of(&stored.record, &key).as_ref() == Some(&id));
            if taken {
                return Err(MapError::Storage(format!(
                    "'{}' already holds a record with {} = {}",
                    record.name(),
                    key,
                    id
                )));
            }
        }

        event!(Level::DEBUG, collection = %record.name(), ttl = ?ttl, "record inserted");
        records.push(StoredRecord {
            record: record.clone(),
            expires_at: ttl.map(|ttl| now + ttl),
        });
        Ok(record)
    }

    fn replace(&self, record: Record) -> Result<Record> {
        let key = self.key_name(record.name())?;
        let id = Self::key_of(&record, &key).ok_or_else(|| {
            MapError::Storage(format!("update of '{}' requires the '{}' entry", record.name(), key))
        })?;
        let now = Instant::now();
        let mut collections = self.collections.write()?;
        let stored = collections
            .get_mut(record.name())
            .and_then(|records| {
                records.iter_mut().find(|stored| {
                    stored.is_live(now) && Self::key_of(&stored.record, &key).as_ref() == Some(&id)
                })
            })
            .ok_or_else(|| {
                MapError::Storage(format!("'{}' holds no record with {} = {}", record.name(), key, id))
            })?;

        event!(Level::DEBUG, collection = %record.name(), "record updated");
        stored.record = record.clone();
        Ok(record)
    }

    fn matches(&self, condition: &Option<Condition>, record: &Record) -> Result<bool> {
        match condition {
            Some(condition) => condition.matches_with(record, &self.patterns),
            None => Ok(true),
        }
    }

    fn remove(&self, query: &DeleteQuery) -> Result<()> {
        let now = Instant::now();
        let mut collections = self.collections.write()?;
        let Some(records) = collections.get_mut(&query.collection) else {
            return Ok(());
        };

        let mut doomed = Vec::with_capacity(records.len());
        for stored in records.iter() {
            doomed.push(!stored.is_live(now) || self.matches(&query.condition, &stored.record)?);
        }
        let before = records.len();
        let mut flags = doomed.into_iter();
        records.retain(|_| !flags.next().unwrap_or(false));
        let removed = before - records.len();
        event!(Level::DEBUG, collection = %query.collection, removed, "records deleted");
        Ok(())
    }

    fn find(&self, query: &SelectQuery) -> Result<Vec<Record>> {
        let now = Instant::now();
        let collections = self.collections.read()?;
        let Some(records) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for stored in records.iter().filter(|stored| stored.is_live(now)) {
            if self.matches(&query.condition, &stored.record)? {
                found.push(stored.record.clone());
            }
        }

        if !query.sorts.is_empty() {
            found.sort_by(|a, b| {
                for sort in &query.sorts {
                    let ordering = sort_order(&sort_key(a, &sort.field), &sort_key(b, &sort.field));
                    let ordering = match sort.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(query.skip).take(limit).collect())
    }
}

impl Default for InMemoryTemplate {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_key(record: &Record, field: &str) -> Value {
    match record.find_path(field) {
        Some(RecordValue::Scalar(value)) => value.clone(),
        _ => Value::Null,
    }
}

/// Total order for sorting: values that cannot be compared are grouped by
/// type name.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::List(left), Value::List(right)) => left
            .iter()
            .zip(right)
            .map(|(l, r)| sort_order(l, r))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| left.len().cmp(&right.len())),
        _ => a
            .compare(b)
            .unwrap_or_else(|_| a.type_name().cmp(b.type_name())),
    }
}

impl StorageTemplate for InMemoryTemplate {
    fn insert(&self, record: Record) -> Result<Record> {
        self.store(record, None)
    }

    fn insert_with_ttl(&self, record: Record, ttl: Duration) -> Result<Record> {
        self.store(record, Some(ttl))
    }

    fn update(&self, record: Record) -> Result<Record> {
        self.replace(record)
    }

    fn delete(&self, query: DeleteQuery) -> Result<()> {
        self.remove(&query)
    }

    fn select(&self, query: &SelectQuery) -> Result<Vec<Record>> {
        self.find(query)
    }
}

#[async_trait]
impl AsyncStorageTemplate for InMemoryTemplate {
    async fn insert(&self, record: Record) -> Result<Record> {
        self.store(record, None)
    }

    async fn insert_with_ttl(&self, record: Record, ttl: Duration) -> Result<Record> {
        self.store(record, Some(ttl))
    }

    async fn update(&self, record: Record) -> Result<Record> {
        self.replace(record)
    }

    async fn delete(&self, query: DeleteQuery) -> Result<()> {
        self.remove(&query)
    }

    async fn select(&self, query: &SelectQuery) -> Result<Vec<Record>> {
        self.find(query)
    }
}
