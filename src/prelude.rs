//! Everything needed to declare entities and run repositories.
//!
//! ```
//! use recordmap::prelude::*;
//! ```

pub use crate::{
    AsyncRepository, AsyncStorageTemplate, Condition, DeleteQuery, Embeddable, Entity, InMemoryTemplate,
    MapError, Mapper, MapperConfig, Record, RecordEntry, RecordValue, Repository, Result, SelectQuery,
    StorageTemplate, Value,
};
