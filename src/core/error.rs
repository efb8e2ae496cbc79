use crate::context::{EntityKey, LifecycleOp, Status};
use thiserror::Error;

/// Failures raised by a [`SqlExecutor`](crate::storage::SqlExecutor).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// Failures raised by the persistence context and the session.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Type '{0}' is not a registered entity kind")]
    InvalidEntityKind(String),

    #[error("Entity '{entity}' has no identity value")]
    MissingIdentity { entity: String },

    #[error("Identity {0} is already tracked by the persistence context")]
    DuplicateIdentity(EntityKey),

    #[error("Cannot {operation} an entity in status {status}")]
    InvalidLifecycleTransition {
        status: Status,
        operation: LifecycleOp,
    },

    #[error("Illegal managed state: {0}")]
    IllegalManagedState(String),

    #[error("No row found for {0}")]
    NotFound(EntityKey),

    #[error("Persisting entity '{entity}' failed: {source}")]
    PersistFailed {
        entity: String,
        #[source]
        source: Box<PersistenceError>,
    },

    #[error("Flush failed at {key}: {source}")]
    FlushFailed {
        key: EntityKey,
        #[source]
        source: Box<PersistenceError>,
    },

    #[error("Row mapping error: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PersistenceError {
    pub(crate) fn persist_failed(entity: &str, source: PersistenceError) -> Self {
        Self::PersistFailed {
            entity: entity.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn flush_failed(key: EntityKey, source: PersistenceError) -> Self {
        Self::FlushFailed {
            key,
            source: Box::new(source),
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub type Result<T> = std::result::Result<T, PersistenceError>;
