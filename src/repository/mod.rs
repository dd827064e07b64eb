//! CRUD facades over storage templates.

mod async_repository;

pub use async_repository::AsyncRepository;

use crate::access::Entity;
use crate::core::{MapError, Result, Value};
use crate::mapping::EntityConverter;
use crate::model::EntityMetadata;
use crate::query::{DeleteQuery, MethodQuery, SelectQuery};
use crate::record::Record;
use crate::template::StorageTemplate;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, event, info_span};

/// Generic repository of `T` over a synchronous template.
///
/// `save` is an upsert: it probes for the id first and then updates or
/// inserts. The probe and the write are separate template calls, so two
/// concurrent saves of a new id can both insert.
pub struct Repository<T: Entity, S: StorageTemplate + ?Sized> {
    template: Arc<S>,
    converter: EntityConverter,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, S: StorageTemplate + ?Sized> Repository<T, S> {
    pub fn new(template: Arc<S>, converter: EntityConverter) -> Self {
        Self {
            template,
            converter,
            _entity: PhantomData,
        }
    }

    pub fn template(&self) -> &Arc<S> {
        &self.template
    }

    pub fn converter(&self) -> &EntityConverter {
        &self.converter
    }

    pub fn save(&self, entity: &T) -> Result<T> {
        self.save_entity(entity, None)
    }

    /// Like [`save`](Self::save); a fresh insert expires after `ttl`.
    pub fn save_with_ttl(&self, entity: &T, ttl: Duration) -> Result<T> {
        self.save_entity(entity, Some(ttl))
    }

    pub fn save_all<'a, I>(&self, entities: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = &'a T>,
    {
        entities.into_iter().map(|entity| self.save(entity)).collect()
    }

    pub fn save_all_with_ttl<'a, I>(&self, entities: I, ttl: Duration) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = &'a T>,
    {
        entities
            .into_iter()
            .map(|entity| self.save_with_ttl(entity, ttl))
            .collect()
    }

    /// Deletes by the entity's id; an absent id is `NullId`.
    pub fn delete(&self, entity: &T) -> Result<()> {
        let metadata = self.metadata()?;
        let id = self
            .converter
            .id_of(entity)?
            .ok_or_else(|| MapError::NullId(metadata.name().to_string()))?;
        self.delete_stored(&metadata, id)
    }

    pub fn delete_all<'a, I>(&self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a T>,
    {
        for entity in entities {
            self.delete(entity)?;
        }
        Ok(())
    }

    pub fn delete_by_id(&self, id: impl Into<Value>) -> Result<()> {
        let (metadata, id) = self.storage_id(id.into())?;
        self.delete_stored(&metadata, id)
    }

    pub fn delete_by_ids<I, V>(&self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for id in ids {
            self.delete_by_id(id)?;
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<T>> {
        let (metadata, id) = self.storage_id(id.into())?;
        let span = info_span!("repository.find_by_id", entity = %metadata.name(), id = %id);
        let _enter = span.enter();

        match self.template.single_result(&id_select(&metadata, id)?)? {
            Some(record) => self.converter.to_entity(&record).map(Some),
            None => Ok(None),
        }
    }

    /// Entities found for `ids`, in order; missing ids are left out.
    pub fn find_by_ids<I, V>(&self, ids: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut found = Vec::new();
        for id in ids {
            if let Some(entity) = self.find_by_id(id)? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    pub fn exists_by_id(&self, id: impl Into<Value>) -> Result<bool> {
        let (metadata, id) = self.storage_id(id.into())?;
        self.exists_stored(&metadata, id)
    }

    pub fn find_all(&self) -> Result<Vec<T>> {
        let metadata = self.metadata()?;
        self.select(&SelectQuery::new(metadata.name()))
    }

    pub fn select(&self, query: &SelectQuery) -> Result<Vec<T>> {
        self.to_entities(self.template.select(query)?)
    }

    /// Runs a `findBy...` method name with its arguments.
    pub fn find_by_method(&self, method: &str, args: &[Value]) -> Result<Vec<T>> {
        let metadata = self.metadata()?;
        match MethodQuery::parse(method, args, &metadata)? {
            MethodQuery::Select(query) => self.select(&query),
            MethodQuery::Delete(_) => Err(MapError::InvalidQuery(format!("'{}' is not a find method", method))),
        }
    }

    /// Runs a `deleteBy...` method name with its arguments.
    pub fn delete_by_method(&self, method: &str, args: &[Value]) -> Result<()> {
        let metadata = self.metadata()?;
        match MethodQuery::parse(method, args, &metadata)? {
            MethodQuery::Delete(query) => self.template.delete(query),
            MethodQuery::Select(_) => Err(MapError::InvalidQuery(format!("'{}' is not a delete method", method))),
        }
    }

    fn metadata(&self) -> Result<Arc<EntityMetadata>> {
        self.converter.entities().get::<T>()
    }

    fn storage_id(&self, id: Value) -> Result<(Arc<EntityMetadata>, Value)> {
        let (metadata, id) = self.converter.id_to_storage::<T>(id)?;
        if id.is_null() {
            return Err(MapError::NullId(metadata.name().to_string()));
        }
        Ok((metadata, id))
    }

    fn save_entity(&self, entity: &T, ttl: Option<Duration>) -> Result<T> {
        let metadata = self.metadata()?;
        let span = info_span!("repository.save", entity = %metadata.name());
        let _enter = span.enter();

        let id = self.converter.id_of(entity)?;
        let record = self.converter.to_record(entity)?;
        let exists = match id {
            Some(id) => self.exists_stored(&metadata, id)?,
            None => false,
        };

        let stored = if exists {
            event!(Level::DEBUG, "id exists, updating");
            self.template.update(record)?
        } else {
            event!(Level::DEBUG, "inserting");
            match ttl {
                Some(ttl) => self.template.insert_with_ttl(record, ttl)?,
                None => self.template.insert(record)?,
            }
        };
        self.converter.to_entity(&stored)
    }

    fn exists_stored(&self, metadata: &EntityMetadata, id: Value) -> Result<bool> {
        Ok(self.template.single_result(&id_select(metadata, id)?)?.is_some())
    }

    fn delete_stored(&self, metadata: &EntityMetadata, id: Value) -> Result<()> {
        let span = info_span!("repository.delete", entity = %metadata.name(), id = %id);
        let _enter = span.enter();
        self.template.delete(id_delete(metadata, id)?)
    }

    fn to_entities(&self, records: Vec<Record>) -> Result<Vec<T>> {
        records
            .iter()
            .map(|record| self.converter.to_entity(record))
            .collect()
    }
}

pub(crate) fn id_select(metadata: &EntityMetadata, id: Value) -> Result<SelectQuery> {
    let field = metadata.require_id_field()?;
    Ok(SelectQuery::by_eq(metadata.name(), field.record_name.clone(), id))
}

pub(crate) fn id_delete(metadata: &EntityMetadata, id: Value) -> Result<DeleteQuery> {
    let field = metadata.require_id_field()?;
    Ok(DeleteQuery::by_eq(metadata.name(), field.record_name.clone(), id))
}
