use super::persister::EntityPersister;
use crate::core::Result;
use crate::metadata::{Entity, EntityMeta};
use crate::sql::SqlBuilder;
use crate::storage::SqlExecutor;

impl<E: SqlExecutor, B: SqlBuilder> EntityPersister<E, B> {
    /// Loads the row with identity `id`, decoded through `meta`.
    pub fn select<T: Entity>(&mut self, meta: &EntityMeta<T>, id: i64) -> Result<Option<T>> {
        let sql = self.builder.select_by_id(meta.table(), id);
        self.log(&sql);
        self.executor.query_mapped(&sql, meta)
    }

    pub fn select_all<T: Entity>(&mut self, meta: &EntityMeta<T>) -> Result<Vec<T>> {
        let sql = self.builder.select_all(meta.table());
        self.log(&sql);
        self.executor.query_all_mapped(&sql, meta)
    }
}
