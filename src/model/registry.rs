use super::entity::EntityMetadata;
use crate::access::{Entity, EntityHandle, EntityMarker};
use crate::core::{MapError, Result};
use log::{debug, info};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of entity metadata, keyed by type and by record name.
///
/// Metadata is built on first access and never changes afterwards. Two
/// threads racing on the same type build identical metadata; the first
/// insert is kept. Two entity types may not share a record name.
#[derive(Default)]
pub struct EntityRegistry {
    by_type: RwLock<HashMap<TypeId, Arc<EntityMetadata>>>,
    by_name: RwLock<HashMap<String, Arc<EntityMetadata>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata of `T`, building it on first access.
    pub fn get<T: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        self.get_by_handle(EntityHandle::of::<T>())
    }

    pub fn get_by_handle(&self, handle: EntityHandle) -> Result<Arc<EntityMetadata>> {
        if let Some(metadata) = self.by_type.read()?.get(&handle.type_id()) {
            return Ok(Arc::clone(metadata));
        }

        let metadata = Arc::new(EntityMetadata::from_descriptor(handle.describe())?);
        info!(
            "Scanned {} as '{}' ({} fields)",
            handle.type_name(),
            metadata.name(),
            metadata.fields().len()
        );

        // by_name is always taken before by_type
        let mut by_name = match metadata.marker() {
            EntityMarker::Entity => Some(self.by_name.write()?),
            EntityMarker::Embeddable => None,
        };
        let mut by_type = self.by_type.write()?;
        if let Some(existing) = by_type.get(&handle.type_id()) {
            return Ok(Arc::clone(existing));
        }

        if let Some(by_name) = by_name.as_mut() {
            if let Some(existing) = by_name.get(metadata.name()) {
                return Err(MapError::InvalidMetadata(format!(
                    "'{}' is already mapped to {}, cannot map {} to it",
                    metadata.name(),
                    existing.type_name(),
                    handle.type_name()
                )));
            }
            by_name.insert(metadata.name().to_string(), Arc::clone(&metadata));
        }
        by_type.insert(handle.type_id(), Arc::clone(&metadata));

        Ok(metadata)
    }

    /// Eagerly registers `T` so it can be resolved by name.
    pub fn register<T: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        let metadata = self.get::<T>()?;
        debug!("Registered entity {}", metadata.name());
        Ok(metadata)
    }

    /// Metadata registered under a record name.
    pub fn find_by_name(&self, name: &str) -> Result<Arc<EntityMetadata>> {
        self.by_name
            .read()?
            .get(name)
            .cloned()
            .ok_or_else(|| MapError::EntityNotFound(name.to_string()))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name
            .read()
            .map(|by_name| by_name.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered record names, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.by_name.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn len(&self) -> usize {
        self.by_type.read().map(|by_type| by_type.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(crate::Entity, Default)]
    struct Book {
        #[column(id)]
        isbn: String,
        title: String,
    }

    #[derive(crate::Embeddable, Default)]
    struct Cover {
        color: String,
    }

    #[test]
    fn test_get_is_idempotent() {
        let registry = EntityRegistry::new();
        let first = registry.get::<Book>().unwrap();
        let second = registry.get::<Book>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "Book");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_by_name() {
        let registry = EntityRegistry::new();
        assert!(matches!(
            registry.find_by_name("Book"),
            Err(MapError::EntityNotFound(name)) if name == "Book"
        ));
        registry.register::<Book>().unwrap();
        assert_eq!(registry.find_by_name("Book").unwrap().fields().len(), 2);
        assert_eq!(registry.names().unwrap(), vec!["Book".to_string()]);
    }

    #[test]
    fn test_embeddables_not_indexed_by_name() {
        let registry = EntityRegistry::new();
        registry.get::<Cover>().unwrap();
        assert!(!registry.contains_name("Cover"));
        assert_eq!(registry.len(), 1);
    }

    #[derive(crate::Entity, Default)]
    #[entity(name = "Book")]
    struct Pamphlet {
        #[column(id)]
        code: String,
    }

    #[test]
    fn test_shared_record_name_rejected() {
        let registry = EntityRegistry::new();
        registry.register::<Book>().unwrap();

        let err = registry.register::<Pamphlet>().unwrap_err();
        assert!(matches!(err, MapError::InvalidMetadata(_)));
        assert!(err.to_string().contains("already mapped"));
        assert!(registry.get::<Pamphlet>().is_err());

        let resolved = registry.find_by_name("Book").unwrap();
        assert!(Arc::ptr_eq(&resolved, &registry.get::<Book>().unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_first_access() {
        let registry = Arc::new(EntityRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get::<Book>().unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for metadata in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], metadata));
        }
    }
}
