use super::EntityConverter;
use crate::access::{EntityRef, FieldRef};
use crate::core::{MapError, Result, Value};
use crate::model::{EntityMetadata, FieldKind, FieldMetadata};
use crate::record::{RecordEntry, RecordValue};
use std::any::Any;

impl EntityConverter {
    pub(crate) fn entries_of(&self, metadata: &EntityMetadata, instance: &dyn Any) -> Result<Vec<RecordEntry>> {
        let mut entries = Vec::with_capacity(metadata.fields().len());
        for field in metadata.fields() {
            let value = match (field.get)(instance) {
                Ok(value) => value,
                Err(err) => {
                    self.on_access_error(metadata, field, err)?;
                    continue;
                }
            };
            // absent values are skipped; empty collections are kept
            if value.is_empty() {
                continue;
            }
            let value = self.field_record_value(field, value)?;
            entries.push(RecordEntry::new(field.record_name.clone(), value));
        }
        Ok(entries)
    }

    pub(crate) fn scalar_of(
        &self,
        metadata: &EntityMetadata,
        field: &FieldMetadata,
        instance: &dyn Any,
    ) -> Result<Option<Value>> {
        match (field.get)(instance)? {
            FieldRef::Null => Ok(None),
            FieldRef::Scalar(value) if value.is_null() => Ok(None),
            FieldRef::Scalar(value) => Ok(Some(value)),
            other => Err(MapError::TypeMismatch(format!(
                "{}.{} is not a scalar ({})",
                metadata.name(),
                field.field_name,
                other.shape_name()
            ))),
        }
    }

    fn field_record_value(&self, field: &FieldMetadata, value: FieldRef<'_>) -> Result<RecordValue> {
        match &field.kind {
            FieldKind::Scalar => {
                let raw = pack(value, &field.record_name)?;
                Ok(RecordValue::Scalar(self.to_storage(field, raw)?))
            }
            FieldKind::Embedded(_) => match value {
                FieldRef::Entity(nested) => Ok(RecordValue::Record(self.nested_entries(nested)?)),
                other => Err(shape_mismatch(&field.record_name, "an entity", &other)),
            },
            FieldKind::Collection { element, .. } => {
                let elements = match value {
                    FieldRef::Elements(elements) => elements,
                    other => return Err(shape_mismatch(&field.record_name, "a collection", &other)),
                };
                match **element {
                    FieldKind::Embedded(_) | FieldKind::Map => {
                        let mut lists = Vec::with_capacity(elements.len());
                        for element in elements {
                            lists.push(self.entries_from_ref(element, &field.record_name)?);
                        }
                        Ok(RecordValue::RecordList(lists))
                    }
                    _ => {
                        let mut packed = Vec::with_capacity(elements.len());
                        for element in elements {
                            let raw = pack(element, &field.record_name)?;
                            packed.push(self.to_storage(field, raw)?);
                        }
                        Ok(RecordValue::Scalar(Value::List(packed)))
                    }
                }
            }
            FieldKind::Map => Ok(RecordValue::Map(self.entries_from_ref(value, &field.record_name)?)),
        }
    }

    fn nested_entries(&self, nested: EntityRef<'_>) -> Result<Vec<RecordEntry>> {
        let metadata = self.entities.get_by_handle(nested.handle())?;
        self.entries_of(&metadata, nested.value())
    }

    /// Nested entries of an embedded instance or of a map. An absent
    /// element of an embeddable collection is written as an empty record.
    fn entries_from_ref(&self, value: FieldRef<'_>, name: &str) -> Result<Vec<RecordEntry>> {
        match value {
            FieldRef::Null => Ok(Vec::new()),
            FieldRef::Entity(nested) => self.nested_entries(nested),
            FieldRef::Entries(entries) => {
                let mut converted = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    converted.push(RecordEntry::new(key, self.dynamic_record_value(value, name)?));
                }
                Ok(converted)
            }
            other => Err(shape_mismatch(name, "nested entries", &other)),
        }
    }

    /// Record value of a map value, following its runtime shape.
    fn dynamic_record_value(&self, value: FieldRef<'_>, name: &str) -> Result<RecordValue> {
        match value {
            FieldRef::Null => Ok(RecordValue::Scalar(Value::Null)),
            FieldRef::Scalar(value) => Ok(RecordValue::Scalar(value)),
            FieldRef::Entity(nested) => Ok(RecordValue::Record(self.nested_entries(nested)?)),
            FieldRef::Entries(entries) => Ok(RecordValue::Map(
                self.entries_from_ref(FieldRef::Entries(entries), name)?,
            )),
            FieldRef::Elements(elements) => {
                let nested = elements
                    .iter()
                    .any(|element| matches!(element, FieldRef::Entity(_) | FieldRef::Entries(_)))
                    && elements.iter().all(|element| {
                        matches!(element, FieldRef::Entity(_) | FieldRef::Entries(_) | FieldRef::Null)
                    });
                if nested {
                    let mut lists = Vec::with_capacity(elements.len());
                    for element in elements {
                        lists.push(self.entries_from_ref(element, name)?);
                    }
                    Ok(RecordValue::RecordList(lists))
                } else {
                    pack(FieldRef::Elements(elements), name).map(RecordValue::Scalar)
                }
            }
        }
    }
}

/// Packs a scalar-only value (nested lists included) into a `Value`.
fn pack(value: FieldRef<'_>, name: &str) -> Result<Value> {
    match value {
        FieldRef::Null => Ok(Value::Null),
        FieldRef::Scalar(value) => Ok(value),
        FieldRef::Elements(elements) => elements
            .into_iter()
            .map(|element| pack(element, name))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        other => Err(shape_mismatch(name, "a scalar", &other)),
    }
}

fn shape_mismatch(name: &str, expected: &str, found: &FieldRef<'_>) -> MapError {
    MapError::TypeMismatch(format!(
        "'{}' expected {}, found {}",
        name,
        expected,
        found.shape_name()
    ))
}
