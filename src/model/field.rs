use crate::access::{CollectionShape, DeclaredType, EntityHandle, FieldGetter, FieldSetter, TypeShape};
use std::fmt;

/// Conversion strategy of a field, derived from its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar,
    Map,
    Collection {
        element: Box<FieldKind>,
        shape: CollectionShape,
    },
    Embedded(EntityHandle),
}

impl FieldKind {
    /// Whether a collection's elements are mapped as nested records.
    pub fn is_embeddable_element(&self) -> bool {
        match self {
            Self::Collection { element, .. } => matches!(**element, Self::Embedded(_)),
            _ => false,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Map => "map",
            Self::Collection { .. } => "collection",
            Self::Embedded(_) => "embedded",
        }
    }
}

/// Classifies a declared type. Collection shape is checked first, then map
/// shape, then the entity/embeddable marker; anything else is a scalar.
pub fn classify(declared: &DeclaredType) -> FieldKind {
    match &declared.shape {
        TypeShape::Collection { shape, element } => FieldKind::Collection {
            element: Box::new(classify(element)),
            shape: *shape,
        },
        TypeShape::Map { .. } => FieldKind::Map,
        TypeShape::Marked(handle) => FieldKind::Embedded(*handle),
        TypeShape::Plain => FieldKind::Scalar,
    }
}

#[derive(Clone)]
pub struct FieldMetadata {
    pub field_name: &'static str,
    pub record_name: String,
    pub kind: FieldKind,
    pub converter: Option<String>,
    pub declared: DeclaredType,
    pub(crate) get: FieldGetter,
    pub(crate) set: FieldSetter,
}

impl FieldMetadata {
    pub fn is_nullable(&self) -> bool {
        self.declared.nullable
    }

    /// Value type of a map field.
    pub fn map_value_type(&self) -> Option<&DeclaredType> {
        match &self.declared.shape {
            TypeShape::Map { value } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for FieldMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMetadata")
            .field("field_name", &self.field_name)
            .field("record_name", &self.record_name)
            .field("kind", &self.kind)
            .field("converter", &self.converter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::FieldType;
    use std::collections::{BTreeMap, HashSet};

    #[derive(crate::Embeddable, Default, Debug, PartialEq, Eq, Hash)]
    struct Tag {
        label: String,
    }

    #[test]
    fn test_classify_scalars() {
        assert_eq!(classify(&i64::declared_type()), FieldKind::Scalar);
        assert_eq!(classify(&Option::<String>::declared_type()), FieldKind::Scalar);
        assert_eq!(classify(&chrono::NaiveDate::declared_type()), FieldKind::Scalar);
    }

    #[test]
    fn test_classify_collection_before_marker() {
        let kind = classify(&Vec::<Tag>::declared_type());
        assert!(kind.is_embeddable_element());
        match kind {
            FieldKind::Collection { shape, .. } => assert_eq!(shape, CollectionShape::List),
            other => panic!("unexpected kind {:?}", other),
        }

        let kind = classify(&HashSet::<String>::declared_type());
        assert!(!kind.is_embeddable_element());
    }

    #[test]
    fn test_classify_map_and_embedded() {
        assert_eq!(classify(&BTreeMap::<String, Tag>::declared_type()), FieldKind::Map);
        assert!(classify(&Tag::declared_type()).is_embedded());
        assert!(classify(&Option::<Tag>::declared_type()).is_embedded());
    }
}
