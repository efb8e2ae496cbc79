use crate::core::{PersistenceError, Result, Value};
use crate::metadata::{EntityRow, TableMeta};
use crate::sql::{DmlQueryBuilder, SqlBuilder};
use crate::storage::SqlExecutor;
use tracing::{Level, event};

/// Turns entity rows into statements and runs them.
///
/// Reads live in `loader.rs`.
pub struct EntityPersister<E, B = DmlQueryBuilder> {
    pub(super) executor: E,
    pub(super) builder: B,
    pub(super) log_sql: bool,
}

impl<E: SqlExecutor, B: SqlBuilder> EntityPersister<E, B> {
    pub fn new(executor: E, builder: B, log_sql: bool) -> Self {
        Self {
            executor,
            builder,
            log_sql,
        }
    }

    pub fn insert(&mut self, table: &TableMeta, row: &EntityRow) -> Result<()> {
        check_finite(table, row)?;
        let sql = self.builder.insert(table, row);
        self.execute(&sql)?;
        Ok(())
    }

    /// Returns the number of rows updated.
    pub fn update(&mut self, table: &TableMeta, row: &EntityRow, id: i64) -> Result<u64> {
        check_finite(table, row)?;
        let sql = self.builder.update(table, row, id);
        self.execute(&sql)
    }

    /// Returns the number of rows deleted.
    pub fn delete(&mut self, table: &TableMeta, id: i64) -> Result<u64> {
        let sql = self.builder.delete(table, id);
        self.execute(&sql)
    }

    /// Largest stored identity, `0` for an empty table.
    pub fn max_id(&mut self, table: &TableMeta) -> Result<i64> {
        let sql = self.builder.select_max_id(table);
        self.log(&sql);
        match self.executor.query_scalar(&sql)? {
            Value::Null => Ok(0),
            value => value.as_i64().ok_or_else(|| {
                PersistenceError::Mapping(format!(
                    "MAX({}) of '{}' returned {}",
                    table.id_column().name,
                    table.table_name(),
                    value.type_name()
                ))
            }),
        }
    }

    pub fn create_table(&mut self, table: &TableMeta) -> Result<()> {
        let sql = self.builder.create_table(table);
        self.execute(&sql)?;
        Ok(())
    }

    pub fn drop_table(&mut self, table: &TableMeta) -> Result<()> {
        let sql = self.builder.drop_table(table);
        self.execute(&sql)?;
        Ok(())
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        self.log(sql);
        Ok(self.executor.execute(sql)?)
    }

    pub(super) fn log(&self, sql: &str) {
        if self.log_sql {
            event!(Level::DEBUG, sql, "executing statement");
        }
    }
}

// NaN and infinities have no SQL literal form.
fn check_finite(table: &TableMeta, row: &EntityRow) -> Result<()> {
    for (column, value) in table.columns().iter().zip(&row.values) {
        if matches!(value, Value::Float(f) if !f.is_finite()) {
            return Err(PersistenceError::Mapping(format!(
                "property '{}' of '{}' holds {}, which cannot be stored",
                column.property,
                table.entity_name(),
                value
            )));
        }
    }
    Ok(())
}
