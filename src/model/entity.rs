use super::field::{FieldMetadata, classify};
use crate::access::{AnyEntity, EntityDescriptor, EntityMarker};
use crate::core::{MapError, Result};
use std::collections::HashMap;

/// Mapping metadata of one entity or embeddable type.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    name: String,
    type_name: &'static str,
    marker: EntityMarker,
    fields: Vec<FieldMetadata>,
    fields_by_name: HashMap<String, usize>,
    id_field: Option<usize>,
    constructor: fn() -> AnyEntity,
}

impl EntityMetadata {
    /// Builds metadata from a generated descriptor: classifies every field,
    /// indexes record names and locates the id field.
    pub fn from_descriptor(descriptor: EntityDescriptor) -> Result<Self> {
        let mut fields = Vec::with_capacity(descriptor.fields.len());
        let mut fields_by_name = HashMap::with_capacity(descriptor.fields.len());
        let mut id_field = None;

        for (index, field) in descriptor.fields.into_iter().enumerate() {
            if fields_by_name.insert(field.record_name.clone(), index).is_some() {
                return Err(MapError::InvalidMetadata(format!(
                    "{} maps more than one field to '{}'",
                    descriptor.type_name, field.record_name
                )));
            }
            if field.id {
                if let Some(previous) = id_field {
                    let previous: &FieldMetadata = &fields[previous];
                    return Err(MapError::InvalidMetadata(format!(
                        "{} declares more than one id field ('{}' and '{}')",
                        descriptor.type_name, previous.field_name, field.field_name
                    )));
                }
                id_field = Some(index);
            }
            fields.push(FieldMetadata {
                field_name: field.field_name,
                record_name: field.record_name,
                kind: classify(&field.declared),
                converter: field.converter,
                declared: field.declared,
                get: field.get,
                set: field.set,
            });
        }

        Ok(Self {
            name: descriptor.name,
            type_name: descriptor.type_name,
            marker: descriptor.marker,
            fields,
            fields_by_name,
            id_field,
            constructor: descriptor.constructor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn marker(&self) -> EntityMarker {
        self.marker
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }

    pub fn field_by_record_name(&self, record_name: &str) -> Option<&FieldMetadata> {
        self.fields_by_name.get(record_name).map(|&index| &self.fields[index])
    }

    pub fn field_by_name(&self, field_name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|field| field.field_name == field_name)
    }

    pub fn id_field(&self) -> Option<&FieldMetadata> {
        self.id_field.map(|index| &self.fields[index])
    }

    /// Id field, or `IdNotFound` when the type declares none.
    pub fn require_id_field(&self) -> Result<&FieldMetadata> {
        self.id_field()
            .ok_or_else(|| MapError::IdNotFound(self.name.clone()))
    }

    pub fn new_instance(&self) -> AnyEntity {
        (self.constructor)()
    }
}
