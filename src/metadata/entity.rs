use crate::core::{DataType, PersistenceError, Result, Value};
use crate::storage::RowMapper;
use std::collections::HashMap;
use std::fmt;

/// A persistable domain type.
///
/// Implementations are usually generated with `#[derive(Entity)]`. The
/// metadata is built once, when the type is registered with a session.
/// `Default` provides the blank instance that rows are decoded into.
pub trait Entity: Default + Clone + 'static {
    fn entity_meta() -> Result<EntityMeta<Self>>;
}

/// A mapped column: property name, column name, and storage type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub property: &'static str,
    pub name: &'static str,
    pub data_type: DataType,
    pub nullable: bool,
}

/// Table-level view of an entity type: what the SQL builder needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    entity_name: &'static str,
    table_name: String,
    id_column: ColumnMeta,
    columns: Vec<ColumnMeta>,
}

impl TableMeta {
    pub fn entity_name(&self) -> &'static str {
        self.entity_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn id_column(&self) -> &ColumnMeta {
        &self.id_column
    }

    /// Persistent non-identity columns, in declaration order.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Every column name, identity first.
    pub fn column_names(&self) -> Vec<&'static str> {
        std::iter::once(self.id_column.name)
            .chain(self.columns.iter().map(|column| column.name))
            .collect()
    }
}

/// Column values of one instance, aligned with [`TableMeta::columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub id: Value,
    pub values: Vec<Value>,
}

/// Getter/setter pair for one persistent property.
pub struct PropertyAccessor<T> {
    column: ColumnMeta,
    get: fn(&T) -> Value,
    set: fn(&mut T, Value) -> Result<()>,
}

impl<T> PropertyAccessor<T> {
    pub fn new(
        property: &'static str,
        column: &'static str,
        data_type: DataType,
        nullable: bool,
        get: fn(&T) -> Value,
        set: fn(&mut T, Value) -> Result<()>,
    ) -> Self {
        Self {
            column: ColumnMeta {
                property,
                name: column,
                data_type,
                nullable,
            },
            get,
            set,
        }
    }

    pub fn name(&self) -> &'static str {
        self.column.property
    }

    pub fn column(&self) -> &ColumnMeta {
        &self.column
    }

    pub fn get(&self, entity: &T) -> Value {
        (self.get)(entity)
    }

    pub fn set(&self, entity: &mut T, value: Value) -> Result<()> {
        (self.set)(entity, value).map_err(|err| {
            PersistenceError::Mapping(format!("property '{}': {}", self.column.property, err))
        })
    }
}

impl<T> fmt::Debug for PropertyAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

struct IdAccessor<T> {
    column: ColumnMeta,
    get: fn(&T) -> Option<i64>,
    set: fn(&mut T, i64),
}

#[derive(Debug, Clone, Copy)]
enum ColumnSlot {
    Id,
    Property(usize),
}

/// Accessor table for an entity type.
///
/// Holds the identity accessor, the ordered persistent properties and a
/// lowercase column lookup used to decode rows.
pub struct EntityMeta<T> {
    table: TableMeta,
    id: IdAccessor<T>,
    properties: Vec<PropertyAccessor<T>>,
    lookup: HashMap<String, ColumnSlot>,
}

impl<T: Entity> EntityMeta<T> {
    pub fn builder(entity_name: &'static str) -> EntityMetaBuilder<T> {
        EntityMetaBuilder {
            entity_name,
            table_name: None,
            id: None,
            properties: Vec::new(),
        }
    }

    pub fn table(&self) -> &TableMeta {
        &self.table
    }

    pub fn entity_name(&self) -> &'static str {
        self.table.entity_name
    }

    pub fn identity_of(&self, entity: &T) -> Option<i64> {
        (self.id.get)(entity)
    }

    pub fn assign_identity(&self, entity: &mut T, id: i64) {
        (self.id.set)(entity, id);
    }

    pub fn properties(&self) -> &[PropertyAccessor<T>] {
        &self.properties
    }

    pub fn property_names(&self) -> Vec<&'static str> {
        self.properties.iter().map(PropertyAccessor::name).collect()
    }

    pub fn property_value(&self, entity: &T, name: &str) -> Option<Value> {
        self.properties
            .iter()
            .find(|property| property.name() == name)
            .map(|property| property.get(entity))
    }

    pub fn row_of(&self, entity: &T) -> EntityRow {
        EntityRow {
            id: self
                .identity_of(entity)
                .map(Value::Integer)
                .unwrap_or(Value::Null),
            values: self
                .properties
                .iter()
                .map(|property| property.get(entity))
                .collect(),
        }
    }
}

impl<T: Entity> RowMapper for EntityMeta<T> {
    type Output = T;

    fn map_row(&self, columns: &[String], row: &[Value]) -> Result<T> {
        let mut entity = T::default();
        for (label, value) in columns.iter().zip(row.iter()) {
            let Some(slot) = self.lookup.get(&label.to_ascii_lowercase()) else {
                continue;
            };
            match *slot {
                ColumnSlot::Id => {
                    let id = value.as_i64().ok_or_else(|| {
                        PersistenceError::Mapping(format!(
                            "identity column '{}' of '{}' holds {}",
                            label,
                            self.table.entity_name,
                            value.type_name()
                        ))
                    })?;
                    self.assign_identity(&mut entity, id);
                }
                ColumnSlot::Property(index) => {
                    self.properties[index].set(&mut entity, value.clone())?;
                }
            }
        }
        Ok(entity)
    }
}

impl<T> fmt::Debug for EntityMeta<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMeta")
            .field("table", &self.table)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

pub struct EntityMetaBuilder<T> {
    entity_name: &'static str,
    table_name: Option<String>,
    id: Option<IdAccessor<T>>,
    properties: Vec<PropertyAccessor<T>>,
}

impl<T: Entity> EntityMetaBuilder<T> {
    /// Overrides the table name. Defaults to the lowercased entity name.
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn id(
        mut self,
        property: &'static str,
        column: &'static str,
        get: fn(&T) -> Option<i64>,
        set: fn(&mut T, i64),
    ) -> Self {
        self.id = Some(IdAccessor {
            column: ColumnMeta {
                property,
                name: column,
                data_type: DataType::Integer,
                nullable: false,
            },
            get,
            set,
        });
        self
    }

    pub fn property(mut self, accessor: PropertyAccessor<T>) -> Self {
        self.properties.push(accessor);
        self
    }

    pub fn build(self) -> Result<EntityMeta<T>> {
        let id = self.id.ok_or_else(|| {
            PersistenceError::Config(format!(
                "entity '{}' declares no identity property",
                self.entity_name
            ))
        })?;

        let mut lookup = HashMap::new();
        lookup.insert(id.column.name.to_ascii_lowercase(), ColumnSlot::Id);
        for (index, property) in self.properties.iter().enumerate() {
            let column = property.column.name.to_ascii_lowercase();
            if lookup.insert(column, ColumnSlot::Property(index)).is_some() {
                return Err(PersistenceError::Config(format!(
                    "entity '{}' maps column '{}' more than once",
                    self.entity_name, property.column.name
                )));
            }
        }
        // Property names resolve too, unless they collide with a column.
        lookup
            .entry(id.column.property.to_ascii_lowercase())
            .or_insert(ColumnSlot::Id);
        for (index, property) in self.properties.iter().enumerate() {
            lookup
                .entry(property.column.property.to_ascii_lowercase())
                .or_insert(ColumnSlot::Property(index));
        }

        let table = TableMeta {
            entity_name: self.entity_name,
            table_name: self
                .table_name
                .unwrap_or_else(|| self.entity_name.to_ascii_lowercase()),
            id_column: id.column.clone(),
            columns: self
                .properties
                .iter()
                .map(|property| property.column.clone())
                .collect(),
        };

        Ok(EntityMeta {
            table,
            id,
            properties: self.properties,
            lookup,
        })
    }
}
