//! Entity metadata: the accessor tables the persistence context reads
//! entities through.

mod entity;
mod registry;
mod values;

pub use entity::{
    ColumnMeta, Entity, EntityMeta, EntityMetaBuilder, EntityRow, PropertyAccessor, TableMeta,
};
pub use registry::EntityRegistry;
pub use values::{IdentityValue, PersistValue};
