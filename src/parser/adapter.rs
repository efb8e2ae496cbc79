use crate::core::{DataType, StorageError, StorageResult, Value};
use crate::parser::ast::*;
use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Converts `sqlparser` output into the narrow [`Statement`] set.
///
/// Anything outside that set is rejected with
/// [`StorageError::UnsupportedOperation`].
pub struct SqlParserAdapter {
    dialect: PostgreSqlDialect,
}

impl SqlParserAdapter {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    pub fn parse(&self, sql: &str) -> StorageResult<Vec<Statement>> {
        let external_stmts = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| StorageError::Parse(e.to_string()))?;

        external_stmts
            .into_iter()
            .map(|stmt| self.convert_statement(stmt))
            .collect()
    }

    /// Parses exactly one statement.
    pub fn parse_one(&self, sql: &str) -> StorageResult<Statement> {
        let mut statements = self.parse(sql)?;
        match statements.len() {
            1 => Ok(statements.remove(0)),
            0 => Err(StorageError::Parse("empty statement".into())),
            n => Err(StorageError::UnsupportedOperation(format!(
                "expected one statement, got {}",
                n
            ))),
        }
    }

    fn convert_statement(&self, stmt: sql_ast::Statement) -> StorageResult<Statement> {
        match stmt {
            sql_ast::Statement::CreateTable(create) => {
                Ok(Statement::CreateTable(self.convert_create_table(create)?))
            }
            sql_ast::Statement::Drop { object_type, names, if_exists, .. } => {
                if let sql_ast::ObjectType::Table = object_type {
                    Ok(Statement::DropTable(self.convert_drop_table(names, if_exists)?))
                } else {
                    Err(StorageError::UnsupportedOperation(format!(
                        "Only DROP TABLE supported, got: {:?}",
                        object_type
                    )))
                }
            }
            sql_ast::Statement::Insert(insert) => {
                Ok(Statement::Insert(self.convert_insert(insert)?))
            }
            sql_ast::Statement::Query(query) => {
                Ok(Statement::Select(self.convert_query(*query)?))
            }
            sql_ast::Statement::Delete(delete) => {
                Ok(Statement::Delete(self.convert_delete(delete)?))
            }
            sql_ast::Statement::Update { table, assignments, selection, .. } => {
                Ok(Statement::Update(self.convert_update(table, assignments, selection)?))
            }
            _ => Err(StorageError::UnsupportedOperation(format!(
                "Statement type not supported: {}",
                stmt
            ))),
        }
    }

    fn convert_create_table(&self, create: sql_ast::CreateTable) -> StorageResult<CreateTableStmt> {
        let table_name = extract_table_name(&create.name)?;
        let columns = create
            .columns
            .into_iter()
            .map(|col| self.convert_column_def(col))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(CreateTableStmt {
            table_name,
            columns,
            if_not_exists: create.if_not_exists,
        })
    }

    fn convert_drop_table(
        &self,
        names: Vec<sql_ast::ObjectName>,
        if_exists: bool,
    ) -> StorageResult<DropTableStmt> {
        if names.len() != 1 {
            return Err(StorageError::UnsupportedOperation(
                "Only single table DROP supported".into(),
            ));
        }

        Ok(DropTableStmt {
            table_name: extract_table_name(&names[0])?,
            if_exists,
        })
    }

    fn convert_column_def(&self, col: sql_ast::ColumnDef) -> StorageResult<ColumnDef> {
        let data_type = self.convert_data_type(&col.data_type)?;
        let nullable = !col
            .options
            .iter()
            .any(|opt| matches!(opt.option, sql_ast::ColumnOption::NotNull));

        Ok(ColumnDef {
            name: col.name.value,
            data_type,
            nullable,
        })
    }

    fn convert_data_type(&self, dt: &sql_ast::DataType) -> StorageResult<DataType> {
        match dt {
            sql_ast::DataType::Int(_)
            | sql_ast::DataType::Integer(_)
            | sql_ast::DataType::BigInt(_) => Ok(DataType::Integer),

            sql_ast::DataType::Float(_)
            | sql_ast::DataType::Double(_)
            | sql_ast::DataType::Real => Ok(DataType::Float),

            sql_ast::DataType::Text
            | sql_ast::DataType::Varchar(_)
            | sql_ast::DataType::Char(_)
            | sql_ast::DataType::String(_) => Ok(DataType::Text),

            sql_ast::DataType::Boolean | sql_ast::DataType::Bool => Ok(DataType::Boolean),

            _ => Err(StorageError::TypeMismatch(format!(
                "Unsupported data type: {}",
                dt
            ))),
        }
    }

    fn convert_insert(&self, insert: sql_ast::Insert) -> StorageResult<InsertStmt> {
        let table_name = insert.table.to_string();

        let columns = if insert.columns.is_empty() {
            None
        } else {
            Some(insert.columns.into_iter().map(|id| id.value).collect())
        };

        let Some(source) = insert.source else {
            return Err(StorageError::UnsupportedOperation(
                "INSERT requires a VALUES clause".into(),
            ));
        };
        let sql_ast::SetExpr::Values(vals) = *source.body else {
            return Err(StorageError::UnsupportedOperation(
                "Only VALUES clause supported".into(),
            ));
        };
        let values = vals
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|expr| convert_literal(&expr))
                    .collect::<StorageResult<Vec<_>>>()
            })
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(InsertStmt {
            table_name,
            columns,
            values,
        })
    }

    fn convert_query(&self, query: sql_ast::Query) -> StorageResult<SelectStmt> {
        let sql_ast::SetExpr::Select(select) = *query.body else {
            return Err(StorageError::UnsupportedOperation(
                "Only SELECT queries supported".into(),
            ));
        };
        let select = *select;

        if select.from.len() != 1 || !select.from[0].joins.is_empty() {
            return Err(StorageError::UnsupportedOperation(
                "SELECT must read exactly one table".into(),
            ));
        }
        let table_name = match &select.from[0].relation {
            sql_ast::TableFactor::Table { name, .. } => extract_table_name(name)?,
            _ => {
                return Err(StorageError::UnsupportedOperation(
                    "Complex table references not supported in SELECT".into(),
                ));
            }
        };

        let projection = self.convert_projection(select.projection)?;
        let selection = select.selection.as_ref().map(convert_predicate).transpose()?;

        Ok(SelectStmt {
            table_name,
            projection,
            selection,
        })
    }

    fn convert_projection(&self, items: Vec<sql_ast::SelectItem>) -> StorageResult<Projection> {
        let mut columns = Vec::with_capacity(items.len());
        for item in items {
            match item {
                sql_ast::SelectItem::Wildcard(_) => return Ok(Projection::Wildcard),
                sql_ast::SelectItem::UnnamedExpr(sql_ast::Expr::Identifier(ident)) => {
                    columns.push(ident.value);
                }
                sql_ast::SelectItem::UnnamedExpr(sql_ast::Expr::Function(func)) => {
                    return convert_max(&func);
                }
                other => {
                    return Err(StorageError::UnsupportedOperation(format!(
                        "Unsupported select item: {}",
                        other
                    )));
                }
            }
        }
        Ok(Projection::Columns(columns))
    }

    fn convert_delete(&self, delete: sql_ast::Delete) -> StorageResult<DeleteStmt> {
        let tables = match delete.from {
            sql_ast::FromTable::WithFromKeyword(tables) => tables,
            sql_ast::FromTable::WithoutKeyword(tables) => tables,
        };
        let Some(table) = tables.first() else {
            return Err(StorageError::Parse("DELETE requires a table name".into()));
        };
        let table_name = match &table.relation {
            sql_ast::TableFactor::Table { name, .. } => extract_table_name(name)?,
            _ => {
                return Err(StorageError::UnsupportedOperation(
                    "Complex table references not supported in DELETE".into(),
                ));
            }
        };

        let selection = delete.selection.as_ref().map(convert_predicate).transpose()?;

        Ok(DeleteStmt {
            table_name,
            selection,
        })
    }

    fn convert_update(
        &self,
        table: sql_ast::TableWithJoins,
        assignments: Vec<sql_ast::Assignment>,
        selection: Option<sql_ast::Expr>,
    ) -> StorageResult<UpdateStmt> {
        let table_name = match table.relation {
            sql_ast::TableFactor::Table { name, .. } => extract_table_name(&name)?,
            _ => {
                return Err(StorageError::UnsupportedOperation(
                    "Complex table references not supported in UPDATE".into(),
                ));
            }
        };

        let assignments = assignments
            .into_iter()
            .map(|assign| {
                let column = match assign.target {
                    sql_ast::AssignmentTarget::ColumnName(col_name) if col_name.0.len() == 1 => {
                        col_name.0[0].to_string()
                    }
                    _ => {
                        return Err(StorageError::UnsupportedOperation(
                            "Only simple column names supported in UPDATE".into(),
                        ));
                    }
                };
                let value = convert_literal(&assign.value)?;
                Ok(Assignment { column, value })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        let selection = selection.as_ref().map(convert_predicate).transpose()?;

        Ok(UpdateStmt {
            table_name,
            assignments,
            selection,
        })
    }
}

impl Default for SqlParserAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_table_name(name: &sql_ast::ObjectName) -> StorageResult<String> {
    name.0
        .last()
        .map(|ident| ident.to_string())
        .ok_or_else(|| StorageError::Parse("Invalid table name".into()))
}

fn convert_max(func: &sql_ast::Function) -> StorageResult<Projection> {
    if !func.name.to_string().eq_ignore_ascii_case("max") {
        return Err(StorageError::UnsupportedOperation(format!(
            "Unsupported function: {}",
            func.name
        )));
    }
    let sql_ast::FunctionArguments::List(arg_list) = &func.args else {
        return Err(StorageError::Parse("MAX requires one argument".into()));
    };
    match arg_list.args.as_slice() {
        [sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(sql_ast::Expr::Identifier(ident)))] => {
            Ok(Projection::Max(ident.value.clone()))
        }
        _ => Err(StorageError::UnsupportedOperation(
            "MAX takes a single column".into(),
        )),
    }
}

fn convert_predicate(expr: &sql_ast::Expr) -> StorageResult<Predicate> {
    match expr {
        sql_ast::Expr::Nested(inner) => convert_predicate(inner),
        sql_ast::Expr::BinaryOp {
            left,
            op: sql_ast::BinaryOperator::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (sql_ast::Expr::Identifier(ident), literal) | (literal, sql_ast::Expr::Identifier(ident)) => {
                Ok(Predicate {
                    column: ident.value.clone(),
                    value: convert_literal(literal)?,
                })
            }
            _ => Err(StorageError::UnsupportedOperation(
                "WHERE must compare a column with a literal".into(),
            )),
        },
        other => Err(StorageError::UnsupportedOperation(format!(
            "Unsupported WHERE clause: {}",
            other
        ))),
    }
}

fn convert_literal(expr: &sql_ast::Expr) -> StorageResult<Value> {
    match expr {
        sql_ast::Expr::Value(val) => convert_value(&val.value),
        sql_ast::Expr::Nested(inner) => convert_literal(inner),
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Minus,
            expr,
        } => match convert_literal(expr)? {
            Value::Integer(i) => Ok(Value::Integer(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(StorageError::TypeMismatch(format!(
                "Cannot negate {}",
                other.type_name()
            ))),
        },
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Plus,
            expr,
        } => convert_literal(expr),
        other => Err(StorageError::UnsupportedOperation(format!(
            "Expected a literal, got: {}",
            other
        ))),
    }
}

fn convert_value(value: &sql_ast::Value) -> StorageResult<Value> {
    match value {
        sql_ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else if let Ok(f) = n.parse::<f64>() {
                Ok(Value::Float(f))
            } else {
                Err(StorageError::Parse(format!("Invalid number: {}", n)))
            }
        }
        sql_ast::Value::SingleQuotedString(s) => Ok(Value::Text(s.clone())),
        sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        sql_ast::Value::Null => Ok(Value::Null),
        other => Err(StorageError::UnsupportedOperation(format!(
            "Unsupported literal: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Statement {
        SqlParserAdapter::new().parse_one(sql).unwrap()
    }

    #[test]
    fn test_parse_create_table() {
        let Statement::CreateTable(create) =
            parse("CREATE TABLE IF NOT EXISTS person (id INTEGER PRIMARY KEY, nick_name TEXT NOT NULL, email TEXT);")
        else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(create.table_name, "person");
        assert!(create.if_not_exists);
        assert_eq!(create.columns.len(), 3);
        assert!(!create.columns[1].nullable);
        assert!(create.columns[2].nullable);
    }

    #[test]
    fn test_parse_insert_with_negative_and_null() {
        let Statement::Insert(insert) =
            parse("INSERT INTO person (id, old, email) VALUES (1, -64, NULL);")
        else {
            panic!("expected INSERT");
        };
        assert_eq!(insert.table_name, "person");
        assert_eq!(
            insert.columns,
            Some(vec!["id".to_string(), "old".to_string(), "email".to_string()])
        );
        assert_eq!(insert.values[0], vec![Value::Integer(1), Value::Integer(-64), Value::Null]);
    }

    #[test]
    fn test_parse_select_shapes() {
        let Statement::Select(select) = parse("SELECT * FROM person WHERE id = 7;") else {
            panic!("expected SELECT");
        };
        assert_eq!(select.projection, Projection::Wildcard);
        assert_eq!(
            select.selection,
            Some(Predicate { column: "id".into(), value: Value::Integer(7) })
        );

        let Statement::Select(max) = parse("SELECT MAX(id) FROM person;") else {
            panic!("expected SELECT");
        };
        assert_eq!(max.projection, Projection::Max("id".into()));
        assert!(max.selection.is_none());
    }

    #[test]
    fn test_parse_update_and_delete() {
        let Statement::Update(update) =
            parse("UPDATE person SET nick_name = 'O''Brien', old = 3 WHERE id = 2;")
        else {
            panic!("expected UPDATE");
        };
        assert_eq!(update.assignments.len(), 2);
        assert_eq!(update.assignments[0].value, Value::Text("O'Brien".into()));

        let Statement::Delete(delete) = parse("DELETE FROM person WHERE id = 2;") else {
            panic!("expected DELETE");
        };
        assert_eq!(delete.table_name, "person");
        assert_eq!(delete.selection.unwrap().value, Value::Integer(2));
    }

    #[test]
    fn test_rejects_unsupported_statements() {
        let adapter = SqlParserAdapter::new();
        assert!(matches!(
            adapter.parse_one("SELECT * FROM a WHERE x > 1"),
            Err(StorageError::UnsupportedOperation(_))
        ));
        assert!(matches!(adapter.parse_one("SELEC oops"), Err(StorageError::Parse(_))));
    }
}
