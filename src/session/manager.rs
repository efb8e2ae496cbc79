use super::{FlushSummary, Session};
use crate::context::Managed;
use crate::core::Result;
use crate::metadata::Entity;
use crate::sql::SqlBuilder;
use crate::storage::SqlExecutor;

/// The unit-of-work surface, for code that should not name a concrete
/// session type.
pub trait EntityManager {
    fn persist<T: Entity>(&mut self, entity: &Managed<T>) -> Result<()>;

    fn find<T: Entity>(&mut self, id: i64) -> Result<Managed<T>>;

    fn remove<T: Entity>(&mut self, entity: &Managed<T>) -> Result<()>;

    fn merge<T: Entity>(&mut self, entity: &Managed<T>) -> Result<Managed<T>>;

    fn flush(&mut self) -> Result<FlushSummary>;
}

impl<E: SqlExecutor, B: SqlBuilder> EntityManager for Session<E, B> {
    fn persist<T: Entity>(&mut self, entity: &Managed<T>) -> Result<()> {
        Session::persist(self, entity)
    }

    fn find<T: Entity>(&mut self, id: i64) -> Result<Managed<T>> {
        Session::find(self, id)
    }

    fn remove<T: Entity>(&mut self, entity: &Managed<T>) -> Result<()> {
        Session::remove(self, entity)
    }

    fn merge<T: Entity>(&mut self, entity: &Managed<T>) -> Result<Managed<T>> {
        Session::merge(self, entity)
    }

    fn flush(&mut self) -> Result<FlushSummary> {
        Session::flush(self)
    }
}
