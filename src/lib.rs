// ============================================================================
// recordmap Library
// ============================================================================

extern crate self as recordmap;

pub mod access;
pub mod config;
pub mod converter;
pub mod core;
pub mod mapping;
pub mod model;
pub mod prelude;
pub mod query;
pub mod record;
pub mod repository;
pub mod template;

// Re-export main types for convenience
pub use access::{AnyEntity, Entity, FieldType};
pub use config::{AccessPolicy, DuplicateEntryPolicy, MapperConfig};
pub use converter::{AttributeConverter, ConverterRegistry};
pub use core::{MapError, Result, Value};
pub use mapping::EntityConverter;
pub use model::{EntityMetadata, EntityRegistry, FieldKind};
pub use query::{Condition, DeleteQuery, MethodQuery, SelectQuery};
pub use record::{Record, RecordEntry, RecordValue};
pub use repository::{AsyncRepository, Repository};
pub use template::{AsyncStorageTemplate, InMemoryTemplate, StorageTemplate};

pub use recordmap_derive::{Embeddable, Entity};

use std::sync::Arc;

// ============================================================================
// High-level Mapper API
// ============================================================================

/// Entry point bundling the entity registry, the converters and the config.
///
/// # Examples
///
/// ```
/// use recordmap::{Entity, InMemoryTemplate, Mapper, Value};
/// use std::sync::Arc;
///
/// #[derive(Entity, Default, Debug, PartialEq)]
/// struct User {
///     #[column(id)]
///     id: i64,
///     name: String,
/// }
///
/// # fn main() -> recordmap::Result<()> {
/// let mapper = Mapper::new();
/// let users = mapper.repository::<User, _>(Arc::new(InMemoryTemplate::new()));
///
/// users.save(&User { id: 1, name: "Alice".into() })?;
/// assert_eq!(users.find_by_id(1)?.map(|u| u.name), Some("Alice".to_string()));
///
/// let record = mapper.converter().to_record(&User { id: 2, name: "Bob".into() })?;
/// assert_eq!(record.find("name").and_then(|e| e.value.as_scalar()), Some(&Value::from("Bob")));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Mapper {
    converter: EntityConverter,
}

impl Mapper {
    /// Mapper with default configuration and no attribute converters
    pub fn new() -> Self {
        Self::with_converters(ConverterRegistry::new(), MapperConfig::default())
    }

    /// Mapper with registered attribute converters
    ///
    /// # Examples
    ///
    /// ```
    /// # use recordmap::{ConverterRegistry, Mapper, MapperConfig, Value};
    /// let mut converters = ConverterRegistry::new();
    /// converters.register_fn("upper", |v| Ok(Value::Text(v.to_string().to_uppercase())), Ok);
    ///
    /// let mapper = Mapper::with_converters(converters, MapperConfig::default());
    /// assert!(mapper.converter().converters().contains("upper"));
    /// ```
    pub fn with_converters(converters: ConverterRegistry, config: MapperConfig) -> Self {
        let converter = EntityConverter::new(Arc::new(EntityRegistry::new()), Arc::new(converters))
            .with_config(config);
        Self { converter }
    }

    pub fn converter(&self) -> &EntityConverter {
        &self.converter
    }

    pub fn entities(&self) -> &Arc<EntityRegistry> {
        self.converter.entities()
    }

    /// Registers `T` eagerly so records can be resolved by name.
    pub fn register<T: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        self.entities().register::<T>()
    }

    /// Synchronous repository of `T` over `template`
    pub fn repository<T: Entity, S: StorageTemplate + ?Sized>(&self, template: Arc<S>) -> Repository<T, S> {
        Repository::new(template, self.converter.clone())
    }

    /// Asynchronous repository of `T` over `template`
    pub fn async_repository<T: Entity, S: AsyncStorageTemplate + ?Sized>(
        &self,
        template: Arc<S>,
    ) -> AsyncRepository<T, S> {
        AsyncRepository::new(template, self.converter.clone())
    }

    /// In-memory template sharing this mapper's registry and LIKE cache size
    pub fn in_memory_template(&self) -> InMemoryTemplate {
        InMemoryTemplate::with_config(self.converter.config()).with_registry(Arc::clone(self.entities()))
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}
