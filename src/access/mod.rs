//! Compile-time accessor table.
//!
//! `#[derive(Entity)]` / `#[derive(Embeddable)]` implement [`Entity`] and
//! [`FieldType`] for a struct, producing an [`EntityDescriptor`] whose
//! per-field getters and setters replace runtime reflection. Scalar,
//! optional, collection and map field types get their [`FieldType`] impls
//! from `impls.rs`.

mod impls;

use crate::core::{MapError, Result, Value};
use std::any::{Any, TypeId};
use std::fmt;

/// Type-erased entity instance as produced by a constructor.
pub type AnyEntity = Box<dyn Any + Send>;

/// Reads one field of an instance. Fails when the instance is not of the
/// type the descriptor was generated for.
pub type FieldGetter = for<'a> fn(&'a dyn Any) -> Result<FieldRef<'a>>;

/// Assigns one field of an instance from a converted value.
pub type FieldSetter = fn(&mut dyn Any, FieldValue) -> Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityMarker {
    /// Top-level type stored under its own record name.
    Entity,
    /// Type that only lives inside other entities.
    Embeddable,
}

///
/// Mapped type contract, implemented by the derive macros.
///
pub trait Entity: FieldType + Default + Send + 'static {
    const MARKER: EntityMarker;

    fn describe() -> EntityDescriptor;
}

///
/// Per-type conversion between a Rust value and its dynamic field form.
///
pub trait FieldType: Sized + 'static {
    /// Shape of the type as seen by the field classifier.
    fn declared_type() -> DeclaredType;

    /// Borrowing view of the current value.
    fn read(&self) -> FieldRef<'_>;

    /// Rebuilds a value from its dynamic form.
    fn write(value: FieldValue) -> Result<Self>;
}

/// Identifies a mapped type and knows how to describe it.
#[derive(Clone, Copy)]
pub struct EntityHandle {
    type_id: TypeId,
    type_name: &'static str,
    marker: EntityMarker,
    describe: fn() -> EntityDescriptor,
}

impl EntityHandle {
    pub fn of<T: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            marker: T::MARKER,
            describe: T::describe,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn marker(&self) -> EntityMarker {
        self.marker
    }

    pub fn describe(&self) -> EntityDescriptor {
        (self.describe)()
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityHandle {}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandle")
            .field("type_name", &self.type_name)
            .field("marker", &self.marker)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionShape {
    List,
    Deque,
    Set,
    SortedSet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    Plain,
    Collection {
        shape: CollectionShape,
        element: Box<DeclaredType>,
    },
    Map {
        value: Box<DeclaredType>,
    },
    /// A type carrying the entity or embeddable marker.
    Marked(EntityHandle),
}

/// Declared type of a field, as far as mapping is concerned.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredType {
    pub type_name: &'static str,
    pub shape: TypeShape,
    pub nullable: bool,
}

impl DeclaredType {
    pub fn scalar(type_name: &'static str) -> Self {
        Self {
            type_name,
            shape: TypeShape::Plain,
            nullable: false,
        }
    }

    pub fn collection(type_name: &'static str, shape: CollectionShape, element: DeclaredType) -> Self {
        Self {
            type_name,
            shape: TypeShape::Collection {
                shape,
                element: Box::new(element),
            },
            nullable: false,
        }
    }

    pub fn map(type_name: &'static str, value: DeclaredType) -> Self {
        Self {
            type_name,
            shape: TypeShape::Map {
                value: Box::new(value),
            },
            nullable: false,
        }
    }

    pub fn entity<T: Entity>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            shape: TypeShape::Marked(EntityHandle::of::<T>()),
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn entity_handle(&self) -> Option<EntityHandle> {
        match &self.shape {
            TypeShape::Marked(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// Borrowed, dynamic view of a field value.
pub enum FieldRef<'a> {
    /// Absent value (`None`).
    Null,
    Scalar(Value),
    Entity(EntityRef<'a>),
    Elements(Vec<FieldRef<'a>>),
    Entries(Vec<(String, FieldRef<'a>)>),
}

impl FieldRef<'_> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Scalar(_) => "scalar",
            Self::Entity(_) => "entity",
            Self::Elements(_) => "elements",
            Self::Entries(_) => "entries",
        }
    }
}

#[derive(Clone, Copy)]
pub struct EntityRef<'a> {
    value: &'a dyn Any,
    handle: EntityHandle,
}

impl<'a> EntityRef<'a> {
    pub fn new<T: Entity>(value: &'a T) -> Self {
        Self {
            value,
            handle: EntityHandle::of::<T>(),
        }
    }

    pub fn value(&self) -> &'a dyn Any {
        self.value
    }

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }
}

/// Owned, dynamic form of a field value on its way into an instance.
pub enum FieldValue {
    Null,
    Scalar(Value),
    Entity(AnyEntity),
    Elements(Vec<FieldValue>),
    Entries(Vec<(String, FieldValue)>),
}

impl FieldValue {
    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Scalar(_) => "scalar",
            Self::Entity(_) => "entity",
            Self::Elements(_) => "elements",
            Self::Entries(_) => "entries",
        }
    }

    /// Raw scalar; `Null` maps to `Value::Null`.
    pub fn into_scalar(self, expected: &str) -> Result<Value> {
        match self {
            Self::Scalar(value) => Ok(value),
            Self::Null => Ok(Value::Null),
            other => Err(MapError::TypeMismatch(format!(
                "expected a scalar for {}, found {}",
                expected,
                other.shape_name()
            ))),
        }
    }

    pub fn into_elements(self, expected: &str) -> Result<Vec<FieldValue>> {
        match self {
            Self::Elements(elements) => Ok(elements),
            Self::Null | Self::Scalar(Value::Null) => Ok(Vec::new()),
            Self::Scalar(Value::List(values)) => Ok(values.into_iter().map(Self::Scalar).collect()),
            other => Err(MapError::TypeMismatch(format!(
                "expected elements for {}, found {}",
                expected,
                other.shape_name()
            ))),
        }
    }

    pub fn into_entries(self, expected: &str) -> Result<Vec<(String, FieldValue)>> {
        match self {
            Self::Entries(entries) => Ok(entries),
            Self::Null | Self::Scalar(Value::Null) => Ok(Vec::new()),
            other => Err(MapError::TypeMismatch(format!(
                "expected map entries for {}, found {}",
                expected,
                other.shape_name()
            ))),
        }
    }

    pub fn into_entity<T: Entity>(self) -> Result<T> {
        match self {
            Self::Entity(instance) => instance.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
                MapError::TypeMismatch(format!(
                    "instance is not a {}",
                    std::any::type_name::<T>()
                ))
            }),
            Self::Null => Ok(T::default()),
            other => Err(MapError::TypeMismatch(format!(
                "expected an entity for {}, found {}",
                std::any::type_name::<T>(),
                other.shape_name()
            ))),
        }
    }
}

/// Generated description of a mapped type.
pub struct EntityDescriptor {
    pub type_name: &'static str,
    pub name: String,
    pub marker: EntityMarker,
    pub fields: Vec<FieldDescriptor>,
    pub constructor: fn() -> AnyEntity,
}

/// Generated description of a single field.
pub struct FieldDescriptor {
    pub field_name: &'static str,
    pub record_name: String,
    pub id: bool,
    pub converter: Option<String>,
    pub declared: DeclaredType,
    pub get: FieldGetter,
    pub set: FieldSetter,
}

/// Default-instance factory used as the descriptor constructor.
pub fn construct<T: Default + Send + 'static>() -> AnyEntity {
    Box::new(T::default())
}

pub fn downcast_ref<'a, T: 'static>(instance: &'a dyn Any, field: &str) -> Result<&'a T> {
    instance.downcast_ref::<T>().ok_or_else(|| {
        MapError::access(
            std::any::type_name::<T>(),
            field,
            "instance has a different type",
        )
    })
}

pub fn downcast_mut<'a, T: 'static>(instance: &'a mut dyn Any, field: &str) -> Result<&'a mut T> {
    instance.downcast_mut::<T>().ok_or_else(|| {
        MapError::access(
            std::any::type_name::<T>(),
            field,
            "instance has a different type",
        )
    })
}

/// Simple type name (`Person` for `app::model::Person`).
pub fn simple_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_type_name() {
        assert_eq!(simple_type_name("app::model::Person"), "Person");
        assert_eq!(simple_type_name("Person"), "Person");
        assert_eq!(simple_type_name("alloc::vec::Vec<i32>"), "Vec");
    }

    #[test]
    fn test_into_elements_unpacks_lists() {
        let elements = FieldValue::Scalar(Value::List(vec![1.into(), 2.into()]))
            .into_elements("Vec")
            .unwrap();
        assert_eq!(elements.len(), 2);
        assert!(FieldValue::Null.into_elements("Vec").unwrap().is_empty());
        assert!(FieldValue::Scalar(Value::Integer(1)).into_elements("Vec").is_err());
    }
}
