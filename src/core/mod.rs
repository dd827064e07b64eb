pub mod error;
pub mod value;

pub use error::{MapError, Result};
pub use value::Value;
