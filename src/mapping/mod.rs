//! Bidirectional entity/record conversion.
//!
//! [`EntityConverter`] walks the field metadata of a type and dispatches on
//! each field's [`FieldKind`](crate::model::FieldKind), recursing into
//! embedded entities, embeddable collections and maps.

mod entity_builder;
mod record_builder;

use crate::access::{AnyEntity, Entity};
use crate::config::MapperConfig;
use crate::converter::ConverterRegistry;
use crate::core::{MapError, Result, Value};
use crate::model::{EntityMetadata, EntityRegistry, FieldMetadata};
use crate::record::{Record, RecordEntry};
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Converts entity instances to records and back.
///
/// Holds no per-call state; a single converter can be shared across
/// threads.
#[derive(Clone)]
pub struct EntityConverter {
    entities: Arc<EntityRegistry>,
    converters: Arc<ConverterRegistry>,
    config: MapperConfig,
}

impl EntityConverter {
    pub fn new(entities: Arc<EntityRegistry>, converters: Arc<ConverterRegistry>) -> Self {
        Self {
            entities,
            converters,
            config: MapperConfig::default(),
        }
    }

    /// Converter with fresh registries and no attribute converters.
    pub fn standalone() -> Self {
        Self::new(Arc::new(EntityRegistry::new()), Arc::new(ConverterRegistry::new()))
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn entities(&self) -> &Arc<EntityRegistry> {
        &self.entities
    }

    pub fn converters(&self) -> &Arc<ConverterRegistry> {
        &self.converters
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Builds the record of an instance. Absent (`None`) fields are left
    /// out; entries follow field declaration order.
    pub fn to_record<T: Entity>(&self, entity: &T) -> Result<Record> {
        let metadata = self.entities.get::<T>()?;
        let span = info_span!("mapping.to_record", entity = %metadata.name());
        let _enter = span.enter();

        let entries = self.entries_of(&metadata, entity)?;
        event!(Level::DEBUG, entries = entries.len(), "record built");
        Ok(Record::with_entries(metadata.name(), entries))
    }

    /// Builds an instance of `T` from a record, regardless of its name.
    pub fn to_entity<T: Entity>(&self, record: &Record) -> Result<T> {
        self.to_entity_from_entries(record.entries())
    }

    pub fn to_entity_from_entries<T: Entity>(&self, entries: &[RecordEntry]) -> Result<T> {
        let metadata = self.entities.get::<T>()?;
        let span = info_span!("mapping.to_entity", entity = %metadata.name());
        let _enter = span.enter();

        let instance = self.populate(&metadata, entries)?.instance;
        downcast_instance(instance, &metadata)
    }

    /// Builds an instance of whatever entity is registered under the
    /// record's name.
    pub fn to_entity_by_name(&self, record: &Record) -> Result<AnyEntity> {
        let metadata = self.entities.find_by_name(record.name())?;
        let span = info_span!("mapping.to_entity", entity = %metadata.name());
        let _enter = span.enter();

        Ok(self.populate(&metadata, record.entries())?.instance)
    }

    /// Resolves the record's name, then checks the registered type is `T`.
    pub fn to_entity_named<T: Entity>(&self, record: &Record) -> Result<T> {
        let metadata = self.entities.find_by_name(record.name())?;
        let instance = self.to_entity_by_name(record)?;
        downcast_instance(instance, &metadata)
    }

    /// Storage form of an instance's id, or `None` when the id is absent.
    pub fn id_of<T: Entity>(&self, entity: &T) -> Result<Option<Value>> {
        let metadata = self.entities.get::<T>()?;
        let field = metadata.require_id_field()?;
        match self.scalar_of(&metadata, field, entity)? {
            Some(raw) => self.to_storage(field, raw).map(Some),
            None => Ok(None),
        }
    }

    /// Applies the id field's converter to a caller-supplied id.
    pub fn id_to_storage<T: Entity>(&self, id: Value) -> Result<(Arc<EntityMetadata>, Value)> {
        let metadata = self.entities.get::<T>()?;
        let value = self.to_storage(metadata.require_id_field()?, id)?;
        Ok((metadata, value))
    }

    pub(crate) fn to_storage(&self, field: &FieldMetadata, raw: Value) -> Result<Value> {
        match &field.converter {
            Some(id) if !raw.is_null() => self
                .converters
                .get(id)?
                .to_storage(raw)
                .map_err(|err| as_conversion(id, err)),
            _ => Ok(raw),
        }
    }

    pub(crate) fn to_attribute(&self, field: &FieldMetadata, stored: Value) -> Result<Value> {
        match &field.converter {
            Some(id) if !stored.is_null() => self
                .converters
                .get(id)?
                .to_attribute(stored)
                .map_err(|err| as_conversion(id, err)),
            _ => Ok(stored),
        }
    }

    /// Routes an accessor failure through the access policy: `Ok(())` means
    /// the field is skipped.
    pub(crate) fn on_access_error(&self, metadata: &EntityMetadata, field: &FieldMetadata, err: MapError) -> Result<()> {
        if self.config.is_lenient() {
            log::warn!(
                "Skipping field {}.{}: {}",
                metadata.name(),
                field.field_name,
                err
            );
            Ok(())
        } else {
            Err(err)
        }
    }
}

fn downcast_instance<T: Entity>(instance: AnyEntity, metadata: &EntityMetadata) -> Result<T> {
    instance.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
        MapError::TypeMismatch(format!(
            "'{}' is mapped to {}, not {}",
            metadata.name(),
            metadata.type_name(),
            std::any::type_name::<T>()
        ))
    })
}

/// Failures raised inside a converter surface as [`MapError::Conversion`].
fn as_conversion(converter: &str, err: MapError) -> MapError {
    match err {
        MapError::Conversion { .. } => err,
        other => MapError::conversion(converter, other),
    }
}
