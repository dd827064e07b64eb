//! User-registered attribute converters.

use crate::core::{MapError, Result, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Transforms a scalar between its attribute form and its storage form.
pub trait AttributeConverter: Send + Sync {
    fn to_storage(&self, attribute: Value) -> Result<Value>;

    fn to_attribute(&self, stored: Value) -> Result<Value>;
}

/// Converter built from a pair of functions.
pub struct FnConverter<S, A> {
    to_storage: S,
    to_attribute: A,
}

impl<S, A> FnConverter<S, A>
where
    S: Fn(Value) -> Result<Value> + Send + Sync,
    A: Fn(Value) -> Result<Value> + Send + Sync,
{
    pub fn new(to_storage: S, to_attribute: A) -> Self {
        Self {
            to_storage,
            to_attribute,
        }
    }
}

impl<S, A> AttributeConverter for FnConverter<S, A>
where
    S: Fn(Value) -> Result<Value> + Send + Sync,
    A: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn to_storage(&self, attribute: Value) -> Result<Value> {
        (self.to_storage)(attribute)
    }

    fn to_attribute(&self, stored: Value) -> Result<Value> {
        (self.to_attribute)(stored)
    }
}

/// Converters by identifier. Filled at startup, then shared read-only.
#[derive(Default, Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn AttributeConverter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter, replacing any previous one with the same id.
    pub fn register(&mut self, id: impl Into<String>, converter: impl AttributeConverter + 'static) {
        let id = id.into();
        log::info!("Registered attribute converter: {}", id);
        self.converters.insert(id, Arc::new(converter));
    }

    pub fn register_fn<S, A>(&mut self, id: impl Into<String>, to_storage: S, to_attribute: A)
    where
        S: Fn(Value) -> Result<Value> + Send + Sync + 'static,
        A: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(id, FnConverter::new(to_storage, to_attribute));
    }

    pub fn with(mut self, id: impl Into<String>, converter: impl AttributeConverter + 'static) -> Self {
        self.register(id, converter);
        self
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn AttributeConverter>> {
        self.converters
            .get(id)
            .cloned()
            .ok_or_else(|| MapError::ConverterNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.converters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.converters.keys().collect();
        ids.sort();
        f.debug_struct("ConverterRegistry").field("converters", &ids).finish()
    }
}
