pub mod entity;
pub mod field;
pub mod registry;

pub use entity::EntityMetadata;
pub use field::{FieldKind, FieldMetadata, classify};
pub use registry::EntityRegistry;
