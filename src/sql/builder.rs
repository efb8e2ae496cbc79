use crate::core::Value;
use crate::metadata::{EntityRow, TableMeta};

/// Produces SQL text from table metadata and column values.
///
/// Every statement targets one table and identifies rows by the identity
/// column. Values are rendered with [`Value::to_sql_literal`].
pub trait SqlBuilder {
    fn insert(&self, table: &TableMeta, row: &EntityRow) -> String;

    fn update(&self, table: &TableMeta, row: &EntityRow, id: i64) -> String;

    fn delete(&self, table: &TableMeta, id: i64) -> String;

    fn select_by_id(&self, table: &TableMeta, id: i64) -> String;

    fn select_all(&self, table: &TableMeta) -> String;

    fn select_max_id(&self, table: &TableMeta) -> String;

    fn create_table(&self, table: &TableMeta) -> String;

    fn drop_table(&self, table: &TableMeta) -> String;
}

/// The default [`SqlBuilder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DmlQueryBuilder;

impl DmlQueryBuilder {
    pub fn new() -> Self {
        Self
    }
}

fn literals(values: &[Value]) -> impl Iterator<Item = String> + '_ {
    values.iter().map(Value::to_sql_literal)
}

impl SqlBuilder for DmlQueryBuilder {
    fn insert(&self, table: &TableMeta, row: &EntityRow) -> String {
        let columns = table.column_names().join(", ");
        let values = std::iter::once(row.id.to_sql_literal())
            .chain(literals(&row.values))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO {} ({}) VALUES ({});", table.table_name(), columns, values)
    }

    fn update(&self, table: &TableMeta, row: &EntityRow, id: i64) -> String {
        let assignments = table
            .columns()
            .iter()
            .zip(literals(&row.values))
            .map(|(column, literal)| format!("{} = {}", column.name, literal))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE {} = {};",
            table.table_name(),
            assignments,
            table.id_column().name,
            id
        )
    }

    fn delete(&self, table: &TableMeta, id: i64) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {};",
            table.table_name(),
            table.id_column().name,
            id
        )
    }

    fn select_by_id(&self, table: &TableMeta, id: i64) -> String {
        format!(
            "SELECT * FROM {} WHERE {} = {};",
            table.table_name(),
            table.id_column().name,
            id
        )
    }

    fn select_all(&self, table: &TableMeta) -> String {
        format!("SELECT * FROM {};", table.table_name())
    }

    fn select_max_id(&self, table: &TableMeta) -> String {
        format!("SELECT MAX({}) FROM {};", table.id_column().name, table.table_name())
    }

    fn create_table(&self, table: &TableMeta) -> String {
        let id = table.id_column();
        let columns = std::iter::once(format!("{} {} PRIMARY KEY", id.name, id.data_type))
            .chain(table.columns().iter().map(|column| {
                if column.nullable {
                    format!("{} {}", column.name, column.data_type)
                } else {
                    format!("{} {} NOT NULL", column.name, column.data_type)
                }
            }))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({});", table.table_name(), columns)
    }

    fn drop_table(&self, table: &TableMeta) -> String {
        format!("DROP TABLE IF EXISTS {};", table.table_name())
    }
}
