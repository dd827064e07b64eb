use super::EntityConverter;
use crate::access::{AnyEntity, DeclaredType, FieldValue, TypeShape};
use crate::config::DuplicateEntryPolicy;
use crate::core::{MapError, Result, Value};
use crate::model::{EntityMetadata, FieldKind, FieldMetadata, classify};
use crate::record::{RecordEntry, RecordValue};

pub(crate) struct Populated {
    pub(crate) instance: AnyEntity,
    /// Number of fields assigned from the entries.
    pub(crate) assigned: usize,
}

impl EntityConverter {
    pub(crate) fn populate(&self, metadata: &EntityMetadata, entries: &[RecordEntry]) -> Result<Populated> {
        let mut instance = metadata.new_instance();
        let mut present: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
        present.sort_unstable();

        let mut assigned = 0;
        for field in metadata.fields() {
            let entry = if present.binary_search(&field.record_name.as_str()).is_ok() {
                Some(self.resolve_entry(entries, &field.record_name)?)
            } else if field.kind.is_embedded() {
                None
            } else {
                continue;
            };

            let value = match self.field_value(field, entry, entries) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(err) if is_field_failure(&err) => {
                    self.on_access_error(metadata, field, err)?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            match (field.set)(&mut *instance, value) {
                Ok(()) => assigned += 1,
                Err(err) if is_field_failure(&err) => self.on_access_error(metadata, field, err)?,
                Err(err) => return Err(err),
            }
        }

        Ok(Populated { instance, assigned })
    }

    fn resolve_entry<'a>(&self, entries: &'a [RecordEntry], name: &str) -> Result<&'a RecordEntry> {
        let mut matching = entries.iter().filter(|entry| entry.name == name);
        let first = matching
            .next()
            .ok_or_else(|| MapError::TypeMismatch(format!("no entry named '{}'", name)))?;
        if self.config.duplicate_entries == DuplicateEntryPolicy::Reject && matching.next().is_some() {
            return Err(MapError::DuplicateEntry(name.to_string()));
        }
        Ok(first)
    }

    /// Value to assign to `field`, or `None` to leave it untouched.
    fn field_value(
        &self,
        field: &FieldMetadata,
        entry: Option<&RecordEntry>,
        all: &[RecordEntry],
    ) -> Result<Option<FieldValue>> {
        let value = entry.map(|entry| &entry.value);
        match &field.kind {
            FieldKind::Embedded(handle) => {
                let metadata = self.entities.get_by_handle(*handle)?;
                match value {
                    Some(RecordValue::Record(nested)) | Some(RecordValue::Map(nested)) => {
                        let populated = self.populate(&metadata, nested)?;
                        Ok(Some(FieldValue::Entity(populated.instance)))
                    }
                    Some(RecordValue::Scalar(Value::Null)) => Ok(Some(FieldValue::Null)),
                    Some(other) => Err(shape_mismatch(&field.record_name, "a nested record", other)),
                    None => {
                        // flattened embedding: the nested fields sit among the outer entries
                        let populated = self.populate(&metadata, all)?;
                        Ok((populated.assigned > 0).then(|| FieldValue::Entity(populated.instance)))
                    }
                }
            }
            FieldKind::Scalar => match value {
                Some(RecordValue::Scalar(raw)) => {
                    let attribute = self.to_attribute(field, raw.clone())?;
                    Ok(Some(FieldValue::Scalar(attribute)))
                }
                Some(other) => Err(shape_mismatch(&field.record_name, "a scalar", other)),
                None => Ok(None),
            },
            FieldKind::Collection { .. } => match value {
                Some(RecordValue::Scalar(Value::List(values))) if field.converter.is_some() => {
                    let mut elements = Vec::with_capacity(values.len());
                    for value in values {
                        elements.push(FieldValue::Scalar(self.to_attribute(field, value.clone())?));
                    }
                    Ok(Some(FieldValue::Elements(elements)))
                }
                Some(value) => match collection_element(&field.declared) {
                    Some(element_type) => self
                        .rebuild(element_type, value, true, &field.record_name)
                        .map(Some),
                    None => Err(shape_mismatch(&field.record_name, "a collection", value)),
                },
                None => Ok(None),
            },
            FieldKind::Map => match value {
                Some(value) => self.rebuild(&field.declared, value, false, &field.record_name).map(Some),
                None => Ok(None),
            },
        }
    }

    /// Rebuilds a value from its record form guided by a declared type.
    ///
    /// With `as_collection`, `declared` is the element type and the value is
    /// a whole collection of it.
    fn rebuild(&self, declared: &DeclaredType, value: &RecordValue, as_collection: bool, name: &str) -> Result<FieldValue> {
        if as_collection {
            return match value {
                RecordValue::RecordList(lists) => {
                    let mut elements = Vec::with_capacity(lists.len());
                    for nested in lists {
                        elements.push(self.rebuild_nested(declared, nested, name)?);
                    }
                    Ok(FieldValue::Elements(elements))
                }
                RecordValue::Scalar(Value::List(values)) => {
                    let mut elements = Vec::with_capacity(values.len());
                    for value in values {
                        elements.push(self.rebuild(declared, &RecordValue::Scalar(value.clone()), false, name)?);
                    }
                    Ok(FieldValue::Elements(elements))
                }
                RecordValue::Scalar(Value::Null) => Ok(FieldValue::Null),
                RecordValue::Scalar(single) => Ok(FieldValue::Elements(vec![FieldValue::Scalar(single.clone())])),
                other => Err(shape_mismatch(name, "a collection", other)),
            };
        }

        match classify(declared) {
            FieldKind::Scalar => match value {
                RecordValue::Scalar(raw) => Ok(FieldValue::Scalar(raw.clone())),
                other => Err(shape_mismatch(name, "a scalar", other)),
            },
            FieldKind::Embedded(_) => match value {
                RecordValue::Record(nested) | RecordValue::Map(nested) => self.rebuild_nested(declared, nested, name),
                RecordValue::Scalar(Value::Null) => Ok(FieldValue::Null),
                other => Err(shape_mismatch(name, "a nested record", other)),
            },
            FieldKind::Collection { .. } => match collection_element(declared) {
                Some(element_type) => self.rebuild(element_type, value, true, name),
                None => Err(shape_mismatch(name, "a collection", value)),
            },
            FieldKind::Map => match value {
                RecordValue::Record(nested) | RecordValue::Map(nested) => self.rebuild_nested(declared, nested, name),
                RecordValue::Scalar(Value::Null) => Ok(FieldValue::Null),
                other => Err(shape_mismatch(name, "a map", other)),
            },
        }
    }

    /// Nested entries rebuilt as an embedded instance or as map entries.
    fn rebuild_nested(&self, declared: &DeclaredType, nested: &[RecordEntry], name: &str) -> Result<FieldValue> {
        // an absent optional element was written as an empty record
        if declared.nullable && nested.is_empty() {
            return Ok(FieldValue::Null);
        }
        if let Some(handle) = declared.entity_handle() {
            let metadata = self.entities.get_by_handle(handle)?;
            return Ok(FieldValue::Entity(self.populate(&metadata, nested)?.instance));
        }

        let value_type = match &declared.shape {
            TypeShape::Map { value } => value,
            _ => return Err(MapError::TypeMismatch(format!("'{}' cannot hold nested entries", name))),
        };
        let mut entries = Vec::with_capacity(nested.len());
        for entry in nested {
            let value = self.rebuild(value_type, &entry.value, false, name)?;
            entries.push((entry.name.clone(), value));
        }
        Ok(FieldValue::Entries(entries))
    }
}

/// Failures confined to one field: a failed accessor or a value that
/// cannot be extracted as the declared type.
fn is_field_failure(err: &MapError) -> bool {
    matches!(err, MapError::Access { .. } | MapError::TypeMismatch(_))
}

fn collection_element(declared: &DeclaredType) -> Option<&DeclaredType> {
    match &declared.shape {
        TypeShape::Collection { element, .. } => Some(element),
        _ => None,
    }
}

fn shape_mismatch(name: &str, expected: &str, found: &RecordValue) -> MapError {
    MapError::TypeMismatch(format!(
        "entry '{}' expected {}, found {}",
        name,
        expected,
        found.shape_name()
    ))
}
