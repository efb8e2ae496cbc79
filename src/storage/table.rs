use crate::core::{Column, Row, Schema, StorageError, StorageResult, Value};
use crate::parser::ast::{Assignment, Predicate};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Name and columns of a table. The first column is the primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> StorageResult<Self> {
        let name = name.into();
        let schema = Schema::keyed(&name, columns)?;
        Ok(Self { name, schema })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.columns().iter().map(|c| c.name.clone()).collect()
    }
}

/// Rows of one table, ordered by primary key.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<i64, Row>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, column: &str) -> StorageResult<usize> {
        self.schema
            .schema()
            .index_of(column)
            .ok_or_else(|| StorageError::ColumnNotFound(column.to_string(), self.schema.name.clone()))
    }

    pub fn insert(&mut self, row: Row) -> StorageResult<()> {
        let row = self.schema.schema().admit_row(row)?;
        let key = self.schema.schema().key_of(&row)?;
        if self.rows.contains_key(&key) {
            return Err(StorageError::ConstraintViolation(format!(
                "Duplicate primary key {} in table '{}'",
                key, self.schema.name
            )));
        }
        self.rows.insert(key, row);
        Ok(())
    }

    pub fn select(&self, selection: Option<&Predicate>) -> StorageResult<Vec<Row>> {
        Ok(self
            .matching_keys(selection)?
            .into_iter()
            .filter_map(|key| self.rows.get(&key).cloned())
            .collect())
    }

    pub fn update(&mut self, assignments: &[Assignment], selection: Option<&Predicate>) -> StorageResult<u64> {
        let mut resolved = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let index = self.column_index(&assignment.column)?;
            if index == 0 {
                return Err(StorageError::UnsupportedOperation(format!(
                    "Primary key of table '{}' cannot be updated",
                    self.schema.name
                )));
            }
            let column = &self.schema.schema().columns()[index];
            resolved.push((index, column.admit(assignment.value.clone())?));
        }

        let keys = self.matching_keys(selection)?;
        for key in &keys {
            if let Some(row) = self.rows.get_mut(key) {
                for (index, value) in &resolved {
                    row[*index] = value.clone();
                }
            }
        }
        Ok(keys.len() as u64)
    }

    pub fn delete(&mut self, selection: Option<&Predicate>) -> StorageResult<u64> {
        let keys = self.matching_keys(selection)?;
        for key in &keys {
            self.rows.remove(key);
        }
        Ok(keys.len() as u64)
    }

    /// Largest non-null value of `column`, or `NULL` for an empty table.
    pub fn max(&self, column: &str) -> StorageResult<Value> {
        let index = self.column_index(column)?;
        let mut max = Value::Null;
        for row in self.rows.values() {
            let value = &row[index];
            if value.is_null() {
                continue;
            }
            if max.is_null() || compare(value, &max)? == Ordering::Greater {
                max = value.clone();
            }
        }
        Ok(max)
    }

    fn matching_keys(&self, selection: Option<&Predicate>) -> StorageResult<Vec<i64>> {
        let Some(predicate) = selection else {
            return Ok(self.rows.keys().copied().collect());
        };
        let index = self.column_index(&predicate.column)?;
        if index == 0 {
            return Ok(predicate
                .value
                .as_i64()
                .filter(|key| self.rows.contains_key(key))
                .into_iter()
                .collect());
        }
        let target = self.schema.schema().columns()[index]
            .data_type
            .coerce(predicate.value.clone());
        Ok(self
            .rows
            .iter()
            .filter(|(_, row)| !row[index].is_null() && row[index] == target)
            .map(|(key, _)| *key)
            .collect())
    }
}

fn compare(a: &Value, b: &Value) -> StorageResult<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Ok(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Ok(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(x.total_cmp(&y)),
            _ => Err(StorageError::TypeMismatch(format!(
                "Cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}
