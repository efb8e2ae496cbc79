use super::{QueryResult, SqlExecutor, Table, TableSchema};
use crate::core::{Column, StorageError, StorageResult, Value};
use crate::parser::SqlParserAdapter;
use crate::parser::ast::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{Level, event};

/// Count of successfully executed statements, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatementStats {
    pub ddl: usize,
    pub inserts: usize,
    pub selects: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl StatementStats {
    fn record(&mut self, kind: StatementKind) {
        match kind {
            StatementKind::Ddl => self.ddl += 1,
            StatementKind::Insert => self.inserts += 1,
            StatementKind::Select => self.selects += 1,
            StatementKind::Update => self.updates += 1,
            StatementKind::Delete => self.deletes += 1,
        }
    }

    pub fn writes(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }

    pub fn total(&self) -> usize {
        self.ddl + self.selects + self.writes()
    }
}

/// A single-connection in-memory SQL store.
///
/// Understands the statements [`DmlQueryBuilder`](crate::sql::DmlQueryBuilder)
/// produces. Table and column names are case-insensitive; the first column
/// of every table is its integer primary key.
pub struct MemoryDatabase {
    parser: SqlParserAdapter,
    tables: HashMap<String, Table>,
    stats: StatementStats,
    history: Vec<String>,
    history_limit: usize,
}

/// Statements kept by [`MemoryDatabase::history`] unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self {
            parser: SqlParserAdapter::default(),
            tables: HashMap::new(),
            stats: StatementStats::default(),
            history: Vec::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` statements in the history; `0` disables it.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self.history.truncate(limit);
        self
    }

    pub fn stats(&self) -> StatementStats {
        self.stats
    }

    /// The most recent successful statements, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn reset_stats(&mut self) {
        self.stats = StatementStats::default();
        self.history.clear();
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_ascii_lowercase())
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .tables
            .values()
            .map(|table| table.schema().name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn row_count(&self, table: &str) -> StorageResult<usize> {
        Ok(self.table(table)?.row_count())
    }

    fn run(&mut self, sql: &str) -> StorageResult<QueryResult> {
        let statement = self.parser.parse_one(sql)?;
        let kind = statement.kind();
        let result = match statement {
            Statement::CreateTable(create) => self.create_table(create),
            Statement::DropTable(drop) => self.drop_table(drop),
            Statement::Insert(insert) => self.insert(insert),
            Statement::Select(select) => self.select(select),
            Statement::Update(update) => {
                let table = self.table_mut(&update.table_name)?;
                table
                    .update(&update.assignments, update.selection.as_ref())
                    .map(QueryResult::affected)
            }
            Statement::Delete(delete) => {
                let table = self.table_mut(&delete.table_name)?;
                table.delete(delete.selection.as_ref()).map(QueryResult::affected)
            }
        }?;

        event!(Level::TRACE, sql, rows = result.row_count(), affected = result.affected_rows, "statement executed");
        self.stats.record(kind);
        self.remember(sql);
        Ok(result)
    }

    fn remember(&mut self, sql: &str) {
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() >= self.history_limit {
            let overflow = self.history.len() + 1 - self.history_limit;
            self.history.drain(..overflow);
        }
        self.history.push(sql.to_string());
    }

    fn create_table(&mut self, create: CreateTableStmt) -> StorageResult<QueryResult> {
        let key = create.table_name.to_ascii_lowercase();
        if self.tables.contains_key(&key) {
            if create.if_not_exists {
                return Ok(QueryResult::empty());
            }
            return Err(StorageError::TableExists(create.table_name));
        }

        let columns = create
            .columns
            .into_iter()
            .map(|def| {
                let column = Column::new(def.name, def.data_type);
                if def.nullable { column } else { column.not_null() }
            })
            .collect();
        let schema = TableSchema::new(create.table_name, columns)?;
        self.tables.insert(key, Table::new(schema));
        Ok(QueryResult::empty())
    }

    fn drop_table(&mut self, drop: DropTableStmt) -> StorageResult<QueryResult> {
        let key = drop.table_name.to_ascii_lowercase();
        if self.tables.remove(&key).is_none() && !drop.if_exists {
            return Err(StorageError::TableNotFound(drop.table_name));
        }
        Ok(QueryResult::empty())
    }

    fn insert(&mut self, insert: InsertStmt) -> StorageResult<QueryResult> {
        let table = self.table_mut(&insert.table_name)?;
        let width = table.schema().schema().width();

        let positions = match &insert.columns {
            Some(columns) => columns
                .iter()
                .map(|column| table.column_index(column))
                .collect::<StorageResult<Vec<_>>>()?,
            None => (0..width).collect(),
        };

        let mut rows = Vec::with_capacity(insert.values.len());
        for values in insert.values {
            if values.len() != positions.len() {
                return Err(StorageError::Execution(format!(
                    "INSERT has {} columns but {} values",
                    positions.len(),
                    values.len()
                )));
            }
            let mut row = vec![Value::Null; width];
            for (position, value) in positions.iter().zip(values) {
                row[*position] = value;
            }
            rows.push(row);
        }

        let count = rows.len() as u64;
        for row in rows {
            table.insert(row)?;
        }
        Ok(QueryResult::affected(count))
    }

    fn select(&self, select: SelectStmt) -> StorageResult<QueryResult> {
        let table = self.table(&select.table_name)?;
        match select.projection {
            Projection::Max(column) => {
                if select.selection.is_some() {
                    return Err(StorageError::UnsupportedOperation(
                        "MAX with WHERE is not supported".into(),
                    ));
                }
                let max = table.max(&column)?;
                Ok(QueryResult::new(vec![format!("max({})", column)], vec![vec![max]]))
            }
            Projection::Wildcard => {
                let rows = table.select(select.selection.as_ref())?;
                Ok(QueryResult::new(table.schema().column_names(), rows))
            }
            Projection::Columns(columns) => {
                let indexes = columns
                    .iter()
                    .map(|column| table.column_index(column))
                    .collect::<StorageResult<Vec<_>>>()?;
                let rows = table
                    .select(select.selection.as_ref())?
                    .into_iter()
                    .map(|row| indexes.iter().map(|i| row[*i].clone()).collect())
                    .collect();
                Ok(QueryResult::new(columns, rows))
            }
        }
    }

    fn table(&self, name: &str) -> StorageResult<&Table> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> StorageResult<&mut Table> {
        self.tables
            .get_mut(&name.to_ascii_lowercase())
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }
}

impl SqlExecutor for MemoryDatabase {
    fn execute(&mut self, sql: &str) -> StorageResult<u64> {
        Ok(self.run(sql)?.affected_rows)
    }

    fn query(&mut self, sql: &str) -> StorageResult<QueryResult> {
        self.run(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryDatabase {
        let mut db = MemoryDatabase::new();
        db.execute("CREATE TABLE person (id INTEGER PRIMARY KEY, nick_name TEXT NOT NULL, old INTEGER, email TEXT);")
            .unwrap();
        db.execute("INSERT INTO person (id, nick_name, old, email) VALUES (1, 'Kent Beck', 64, 'beck@example.com');")
            .unwrap();
        db
    }

    #[test]
    fn test_round_trip_through_sql() {
        let mut db = seeded();
        let result = db.query("SELECT * FROM person WHERE id = 1;").unwrap();
        assert_eq!(result.columns, vec!["id", "nick_name", "old", "email"]);
        assert_eq!(result.rows[0][1], Value::Text("Kent Beck".into()));

        assert_eq!(db.execute("UPDATE person SET old = 65 WHERE id = 1;").unwrap(), 1);
        assert_eq!(db.query_scalar("SELECT old FROM person WHERE id = 1;").unwrap(), Value::Integer(65));

        assert_eq!(db.execute("DELETE FROM person WHERE id = 1;").unwrap(), 1);
        assert!(db.query("SELECT * FROM person;").unwrap().is_empty());
    }

    #[test]
    fn test_max_of_empty_table_is_null() {
        let mut db = MemoryDatabase::new();
        db.execute("CREATE TABLE t (id INTEGER, v TEXT);").unwrap();
        assert_eq!(db.query_scalar("SELECT MAX(id) FROM t;").unwrap(), Value::Null);
        db.execute("INSERT INTO t (id, v) VALUES (4, 'x');").unwrap();
        assert_eq!(db.query_scalar("SELECT MAX(id) FROM t;").unwrap(), Value::Integer(4));
    }

    #[test]
    fn test_ddl_errors_and_guards() {
        let mut db = seeded();
        assert_eq!(
            db.execute("CREATE TABLE person (id INTEGER);").unwrap_err(),
            StorageError::TableExists("person".into())
        );
        db.execute("CREATE TABLE IF NOT EXISTS person (id INTEGER);").unwrap();
        db.execute("DROP TABLE person;").unwrap();
        assert!(!db.has_table("PERSON"));
        assert!(matches!(db.execute("DROP TABLE person;"), Err(StorageError::TableNotFound(_))));
        db.execute("DROP TABLE IF EXISTS person;").unwrap();
    }

    #[test]
    fn test_stats_count_only_successful_statements() {
        let mut db = seeded();
        let _ = db.execute("INSERT INTO person (id, nick_name) VALUES (1, 'dup');");
        db.query("SELECT * FROM person;").unwrap();

        let stats = db.stats();
        assert_eq!(stats.ddl, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.selects, 1);
        assert_eq!(stats.total(), 3);
        assert_eq!(db.history().len(), 3);

        db.reset_stats();
        assert_eq!(db.stats(), StatementStats::default());
        assert_eq!(db.row_count("person").unwrap(), 1);
    }

    #[test]
    fn test_history_keeps_most_recent_statements() {
        let mut db = MemoryDatabase::new().with_history_limit(2);
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY);").unwrap();
        db.execute("INSERT INTO t (id) VALUES (1);").unwrap();
        db.execute("INSERT INTO t (id) VALUES (2);").unwrap();
        assert_eq!(
            db.history(),
            &["INSERT INTO t (id) VALUES (1);", "INSERT INTO t (id) VALUES (2);"]
        );

        let mut quiet = MemoryDatabase::new().with_history_limit(0);
        quiet.execute("CREATE TABLE t (id INTEGER PRIMARY KEY);").unwrap();
        assert!(quiet.history().is_empty());
        assert_eq!(quiet.stats().ddl, 1);
    }

    #[test]
    fn test_insert_rejects_unknown_columns() {
        let mut db = seeded();
        assert!(matches!(
            db.execute("INSERT INTO person (id, shoe_size) VALUES (2, 44);"),
            Err(StorageError::ColumnNotFound(_, _))
        ));
        assert!(matches!(
            db.execute("INSERT INTO ghost (id) VALUES (1);"),
            Err(StorageError::TableNotFound(_))
        ));
    }
}
