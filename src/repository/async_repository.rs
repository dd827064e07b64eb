use super::{id_delete, id_select};
use crate::access::Entity;
use crate::core::{MapError, Result, Value};
use crate::mapping::EntityConverter;
use crate::model::EntityMetadata;
use crate::query::{MethodQuery, SelectQuery};
use crate::template::AsyncStorageTemplate;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Level, event, info_span};

/// [`Repository`](super::Repository) over an asynchronous template.
///
/// # Examples
///
/// ```
/// use recordmap::{Entity, Mapper};
/// use std::sync::Arc;
///
/// #[derive(Entity, Default, Debug, PartialEq)]
/// #[entity(name = "notes")]
/// struct Note {
///     #[column(id)]
///     id: i64,
///     body: String,
/// }
///
/// # tokio_test::block_on(async {
/// let mapper = Mapper::new();
/// let notes = mapper.async_repository::<Note, _>(Arc::new(mapper.in_memory_template()));
///
/// notes.save(&Note { id: 7, body: "hello".into() }).await.unwrap();
/// assert!(notes.exists_by_id(7).await.unwrap());
/// # });
/// ```
pub struct AsyncRepository<T: Entity, S: AsyncStorageTemplate + ?Sized> {
    template: Arc<S>,
    converter: EntityConverter,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, S: AsyncStorageTemplate + ?Sized> AsyncRepository<T, S> {
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

    pub async fn save(&self, entity: &T) -> Result<T> {
        self.save_entity(entity, None).await
    }

    pub async fn save_with_ttl(&self, entity: &T, ttl: Duration) -> Result<T> {
        self.save_entity(entity, Some(ttl)).await
    }

    pub async fn save_all<'a, I>(&self, entities: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = &'a T>,
    {
        let mut saved = Vec::new();
        for entity in entities {
            saved.push(self.save(entity).await?);
        }
        Ok(saved)
    }

    pub async fn save_all_with_ttl<'a, I>(&self, entities: I, ttl: Duration) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = &'a T>,
    {
        let mut saved = Vec::new();
        for entity in entities {
            saved.push(self.save_with_ttl(entity, ttl).await?);
        }
        Ok(saved)
    }

    pub async fn delete(&self, entity: &T) -> Result<()> {
        let metadata = self.metadata()?;
        let id = self
            .converter
            .id_of(entity)?
            .ok_or_else(|| MapError::NullId(metadata.name().to_string()))?;
        self.delete_stored(&metadata, id).await
    }

    pub async fn delete_all<'a, I>(&self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a T>,
    {
        for entity in entities {
            self.delete(entity).await?;
        }
        Ok(())
    }

    pub async fn delete_by_id(&self, id: impl Into<Value>) -> Result<()> {
        let (metadata, id) = self.storage_id(id.into())?;
        self.delete_stored(&metadata, id).await
    }

    pub async fn delete_by_ids<I, V>(&self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for id in ids {
            self.delete_by_id(id).await?;
        }
        Ok(())
    }

    pub async fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<T>> {
        let (metadata, id) = self.storage_id(id.into())?;
        let span = info_span!("repository.find_by_id", entity = %metadata.name(), id = %id);
        let query = id_select(&metadata, id)?;

        match self.template.single_result(&query).instrument(span).await? {
            Some(record) => self.converter.to_entity(&record).map(Some),
            None => Ok(None),
        }
    }

    pub async fn find_by_ids<I, V>(&self, ids: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut found = Vec::new();
        for id in ids {
            if let Some(entity) = self.find_by_id(id).await? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    pub async fn exists_by_id(&self, id: impl Into<Value>) -> Result<bool> {
        let (metadata, id) = self.storage_id(id.into())?;
        self.exists_stored(&metadata, id).await
    }

    pub async fn find_all(&self) -> Result<Vec<T>> {
        let metadata = self.metadata()?;
        self.select(&SelectQuery::new(metadata.name())).await
    }

    pub async fn select(&self, query: &SelectQuery) -> Result<Vec<T>> {
        let records = self.template.select(query).await?;
        records
            .iter()
            .map(|record| self.converter.to_entity(record))
            .collect()
    }

    pub async fn find_by_method(&self, method: &str, args: &[Value]) -> Result<Vec<T>> {
        let metadata = self.metadata()?;
        match MethodQuery::parse(method, args, &metadata)? {
            MethodQuery::Select(query) => self.select(&query).await,
            MethodQuery::Delete(_) => Err(MapError::InvalidQuery(format!("'{}' is not a find method", method))),
        }
    }

    pub async fn delete_by_method(&self, method: &str, args: &[Value]) -> Result<()> {
        let metadata = self.metadata()?;
        match MethodQuery::parse(method, args, &metadata)? {
            MethodQuery::Delete(query) => self.template.delete(query).await,
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

    async fn save_entity(&self, entity: &T, ttl: Option<Duration>) -> Result<T> {
        let metadata = self.metadata()?;
        let span = info_span!("repository.save", entity = %metadata.name());

        let id = self.converter.id_of(entity)?;
        let record = self.converter.to_record(entity)?;

        async {
            let exists = match id {
                Some(id) => self.exists_stored(&metadata, id).await?,
                None => false,
            };
            let stored = if exists {
                event!(Level::DEBUG, "id exists, updating");
                self.template.update(record).await?
            } else {
                event!(Level::DEBUG, "inserting");
                match ttl {
                    Some(ttl) => self.template.insert_with_ttl(record, ttl).await?,
                    None => self.template.insert(record).await?,
                }
            };
            self.converter.to_entity(&stored)
        }
        .instrument(span)
        .await
    }

    async fn exists_stored(&self, metadata: &EntityMetadata, id: Value) -> Result<bool> {
        let query = id_select(metadata, id)?;
        Ok(self.template.single_result(&query).await?.is_some())
    }

    async fn delete_stored(&self, metadata: &EntityMetadata, id: Value) -> Result<()> {
        let span = info_span!("repository.delete", entity = %metadata.name(), id = %id);
        let query = id_delete(metadata, id)?;
        self.template.delete(query).instrument(span).await
    }
}
