// ============================================================================
// memoorm - unit-of-work persistence over SQL
// ============================================================================

pub mod context;
pub mod core;
pub mod metadata;
mod parser;
pub mod session;
pub mod sql;
pub mod storage;

// Re-export main types for convenience
pub use context::{EntityEntry, EntityKey, LifecycleOp, Managed, PersistenceContext, Snapshot, Status};
pub use core::{DataType, PersistenceError, Result, StorageError, StorageResult, Value};
pub use metadata::{
    ColumnMeta, Entity, EntityMeta, EntityMetaBuilder, EntityRegistry, EntityRow, IdentityValue,
    PersistValue, PropertyAccessor, TableMeta,
};
pub use session::{EntityManager, FlushSummary, IdGeneration, Session, SessionConfig};
pub use sql::{DmlQueryBuilder, SqlBuilder};
pub use storage::{MemoryDatabase, QueryResult, RowMapper, SqlExecutor, StatementStats};

/// `#[derive(Entity)]`
///
/// ```
/// use memoorm::{Entity, Managed, MemoryDatabase, Session};
///
/// #[derive(Debug, Clone, Default, Entity)]
/// #[entity(table = "person")]
/// struct Person {
///     #[id]
///     id: Option<i64>,
///     #[column(name = "nick_name")]
///     name: String,
///     #[column(name = "old")]
///     age: i32,
///     email: Option<String>,
///     #[transient]
///     index: usize,
/// }
///
/// # fn main() -> memoorm::Result<()> {
/// let mut session = Session::new(MemoryDatabase::new());
/// session.register::<Person>()?;
/// session.create_table::<Person>()?;
///
/// let kent = Managed::new(Person { name: "Kent Beck".into(), age: 64, ..Default::default() });
/// session.persist(&kent)?;
/// assert_eq!(kent.borrow().id, Some(1));
///
/// kent.borrow_mut().age = 65;
/// assert_eq!(session.flush()?.updated, 1);
/// # Ok(())
/// # }
/// ```
pub use memoorm_derive::Entity;
