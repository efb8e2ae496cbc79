use super::QueryResult;
use crate::core::{Result, StorageResult, Value};

/// Decodes one result row into a value.
pub trait RowMapper {
    type Output;

    fn map_row(&self, columns: &[String], row: &[Value]) -> Result<Self::Output>;
}

/// Runs SQL text against a store.
///
/// `execute` is used for DDL and writes and returns the affected-row count.
/// `query` returns a result set.
pub trait SqlExecutor {
    fn execute(&mut self, sql: &str) -> StorageResult<u64>;

    fn query(&mut self, sql: &str) -> StorageResult<QueryResult>;

    /// Maps the first row, if any.
    fn query_mapped<M>(&mut self, sql: &str, mapper: &M) -> Result<Option<M::Output>>
    where
        Self: Sized,
        M: RowMapper + ?Sized,
    {
        let result = self.query(sql)?;
        result
            .first()
            .map(|row| mapper.map_row(&result.columns, row))
            .transpose()
    }

    fn query_all_mapped<M>(&mut self, sql: &str, mapper: &M) -> Result<Vec<M::Output>>
    where
        Self: Sized,
        M: RowMapper + ?Sized,
    {
        let result = self.query(sql)?;
        result
            .rows
            .iter()
            .map(|row| mapper.map_row(&result.columns, row))
            .collect()
    }

    fn query_scalar(&mut self, sql: &str) -> StorageResult<Value> {
        Ok(self.query(sql)?.scalar())
    }
}

impl<E: SqlExecutor + ?Sized> SqlExecutor for Box<E> {
    fn execute(&mut self, sql: &str) -> StorageResult<u64> {
        (**self).execute(sql)
    }

    fn query(&mut self, sql: &str) -> StorageResult<QueryResult> {
        (**self).query(sql)
    }
}

impl<E: SqlExecutor + ?Sized> SqlExecutor for &mut E {
    fn execute(&mut self, sql: &str) -> StorageResult<u64> {
        (**self).execute(sql)
    }

    fn query(&mut self, sql: &str) -> StorageResult<QueryResult> {
        (**self).query(sql)
    }
}
