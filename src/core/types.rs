use super::{DataType, StorageError, StorageResult, Value};

pub type Row = Vec<Value>;

/// A column of an in-memory table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Checks `value` against this column and normalizes it to the column type.
    pub fn admit(&self, value: Value) -> StorageResult<Value> {
        if value.is_null() {
            if self.nullable {
                return Ok(value);
            }
            return Err(StorageError::ConstraintViolation(format!(
                "Column '{}' cannot be NULL",
                self.name
            )));
        }
        if !self.data_type.is_compatible(&value) {
            return Err(StorageError::TypeMismatch(format!(
                "Column '{}' expects {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }
        Ok(self.data_type.coerce(value))
    }
}

/// Columns of a table keyed by its first column.
///
/// The key column is always `INTEGER NOT NULL`; rows are addressed by it.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn keyed(table: &str, mut columns: Vec<Column>) -> StorageResult<Self> {
        let Some(key) = columns.first_mut() else {
            return Err(StorageError::Execution(format!(
                "Table '{}' needs at least one column",
                table
            )));
        };
        if key.data_type != DataType::Integer {
            return Err(StorageError::ConstraintViolation(format!(
                "Primary key '{}' of table '{}' must be INTEGER",
                key.name, table
            )));
        }
        key.nullable = false;
        Ok(Self { columns })
    }

    pub fn key_column(&self) -> &Column {
        &self.columns[0]
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Case-insensitive, matching how unquoted identifiers resolve.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index_of(name).map(|idx| &self.columns[idx])
    }

    /// Validates a full row and returns it with values coerced to column types.
    pub fn admit_row(&self, row: Row) -> StorageResult<Row> {
        if row.len() != self.columns.len() {
            return Err(StorageError::Execution(format!(
                "Expected {} columns, got {}",
                self.columns.len(),
                row.len()
            )));
        }
        self.columns
            .iter()
            .zip(row)
            .map(|(column, value)| column.admit(value))
            .collect()
    }

    pub fn key_of(&self, row: &[Value]) -> StorageResult<i64> {
        row.first().and_then(Value::as_i64).ok_or_else(|| {
            StorageError::ConstraintViolation(format!(
                "Primary key '{}' cannot be NULL",
                self.key_column().name
            ))
        })
    }
}
