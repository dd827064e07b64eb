use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("No entity registered under '{0}'")]
    EntityNotFound(String),

    #[error("No converter registered under '{0}'")]
    ConverterNotFound(String),

    #[error("Entity '{0}' does not declare an id field")]
    IdNotFound(String),

    #[error("Id value of entity '{0}' is required")]
    NullId(String),

    #[error("There is a missed argument in the method {method}")]
    MissingArgument { method: String },

    #[error("Converter '{converter}' failed: {message}")]
    Conversion { converter: String, message: String },

    #[error("Cannot access field '{field}' of '{entity}': {message}")]
    Access {
        entity: String,
        field: String,
        message: String,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Invalid entity metadata: {0}")]
    InvalidMetadata(String),

    #[error("Record entry '{0}' appears more than once")]
    DuplicateEntry(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query on '{0}' returned more than one result")]
    NonUniqueResult(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, MapError>;

impl MapError {
    pub fn conversion(converter: impl Into<String>, message: impl ToString) -> Self {
        Self::Conversion {
            converter: converter.into(),
            message: message.to_string(),
        }
    }

    pub fn access(entity: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Access {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_argument(method: impl Into<String>) -> Self {
        Self::MissingArgument {
            method: method.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for MapError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        Self::TypeMismatch(format!("invalid JSON document: {}", err))
    }
}
