pub mod executor;
pub mod memory;
pub mod result;
pub mod table;

pub use executor::{RowMapper, SqlExecutor};
pub use memory::{MemoryDatabase, StatementStats};
pub use result::QueryResult;
pub use table::{Table, TableSchema};
