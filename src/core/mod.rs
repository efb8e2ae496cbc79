pub mod error;
pub mod types;
pub mod value;

pub use error::{PersistenceError, Result, StorageError, StorageResult};
pub use types::{Column, Row, Schema};
pub use value::{DataType, Value, sql_escape_string};
