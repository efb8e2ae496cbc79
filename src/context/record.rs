use super::{EntityKey, LifecycleOp, Managed, Snapshot, Status};
use crate::core::Result;
use crate::metadata::{Entity, EntityMeta, EntityRow, TableMeta};
use std::any::Any;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{Level, event};

/// Type-erased view of a tracked instance.
pub(crate) trait TrackedEntity {
    fn table(&self) -> &TableMeta;
    fn capture(&self) -> Result<Snapshot>;
    fn row(&self) -> Result<EntityRow>;
    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct TrackedHandle<T: Entity> {
    pub(crate) handle: Managed<T>,
    pub(crate) meta: Rc<EntityMeta<T>>,
}

impl<T: Entity> TrackedEntity for TrackedHandle<T> {
    fn table(&self) -> &TableMeta {
        self.meta.table()
    }

    fn capture(&self) -> Result<Snapshot> {
        Ok(Snapshot::capture(&self.meta, &*self.handle.read()?))
    }

    fn row(&self) -> Result<EntityRow> {
        Ok(self.meta.row_of(&*self.handle.read()?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn downcast_handle<T: Entity>(entity: &dyn TrackedEntity) -> Option<Managed<T>> {
    entity
        .as_any()
        .downcast_ref::<TrackedHandle<T>>()
        .map(|tracked| tracked.handle.clone())
}

/// Tracking data for one identity key.
pub(crate) struct EntityRecord {
    entity: Option<Rc<dyn TrackedEntity>>,
    status: Status,
    snapshot: Option<Snapshot>,
}

impl EntityRecord {
    pub(crate) fn transient(entity: Rc<dyn TrackedEntity>) -> Self {
        Self {
            entity: Some(entity),
            status: Status::New,
            snapshot: None,
        }
    }

    pub(crate) fn loading() -> Self {
        Self {
            entity: None,
            status: Status::Loading,
            snapshot: None,
        }
    }

    pub(crate) fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn entity(&self) -> Option<&Rc<dyn TrackedEntity>> {
        self.entity.as_ref()
    }

    pub(crate) fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub(crate) fn assign_identity(&mut self, key: &EntityKey) -> Result<()> {
        let next = self.status.transition(LifecycleOp::AssignIdentity)?;
        self.set_status(key, next);
        Ok(())
    }

    pub(crate) fn complete_insert(&mut self, key: &EntityKey) -> Result<()> {
        let next = self.status.transition(LifecycleOp::CompleteInsert)?;
        let snapshot = self.capture()?;
        self.snapshot = snapshot;
        self.set_status(key, next);
        Ok(())
    }

    pub(crate) fn complete_load(
        &mut self,
        key: &EntityKey,
        entity: Rc<dyn TrackedEntity>,
    ) -> Result<()> {
        let next = self.status.transition(LifecycleOp::CompleteLoad)?;
        let snapshot = entity.capture()?;
        self.entity = Some(entity);
        self.snapshot = Some(snapshot);
        self.set_status(key, next);
        Ok(())
    }

    /// Replaces the tracked instance and treats its state as the new baseline.
    pub(crate) fn merge(&mut self, key: &EntityKey, entity: Rc<dyn TrackedEntity>) -> Result<()> {
        let next = self.status.transition(LifecycleOp::Merge)?;
        let snapshot = entity.capture()?;
        self.entity = Some(entity);
        self.snapshot = Some(snapshot);
        self.set_status(key, next);
        Ok(())
    }

    pub(crate) fn mark_deleted(&mut self, key: &EntityKey) -> Result<()> {
        let next = self.status.transition(LifecycleOp::MarkDeleted)?;
        self.set_status(key, next);
        Ok(())
    }

    pub(crate) fn complete_delete(&mut self, key: &EntityKey) -> Result<()> {
        let next = self.status.transition(LifecycleOp::CompleteDelete)?;
        self.set_status(key, next);
        Ok(())
    }

    pub(crate) fn mark_read_only(&mut self, key: &EntityKey) -> Result<()> {
        let next = self.status.transition(LifecycleOp::MarkReadOnly)?;
        self.set_status(key, next);
        Ok(())
    }

    pub(crate) fn refresh_snapshot(&mut self) -> Result<()> {
        let snapshot = self.capture()?;
        self.snapshot = snapshot;
        Ok(())
    }

    /// Properties changed since the snapshot. Only managed records can be dirty.
    pub(crate) fn dirty_properties(&self) -> Result<BTreeSet<&'static str>> {
        if self.status != Status::Managed {
            return Ok(BTreeSet::new());
        }
        match (&self.entity, &self.snapshot) {
            (Some(entity), Some(snapshot)) => Ok(snapshot.diff(&entity.capture()?)),
            _ => Ok(BTreeSet::new()),
        }
    }

    fn capture(&self) -> Result<Option<Snapshot>> {
        self.entity.as_ref().map(|entity| entity.capture()).transpose()
    }

    fn set_status(&mut self, key: &EntityKey, next: Status) {
        event!(Level::TRACE, key = %key, from = %self.status, to = %next, "status transition");
        self.status = next;
    }
}

/// An entry handed out by [`PersistenceContext::collect_dirty`] and
/// [`PersistenceContext::collect_deleted`].
///
/// [`PersistenceContext::collect_dirty`]: super::PersistenceContext::collect_dirty
/// [`PersistenceContext::collect_deleted`]: super::PersistenceContext::collect_deleted
#[derive(Clone)]
pub struct EntityEntry {
    key: EntityKey,
    properties: BTreeSet<&'static str>,
    entity: Rc<dyn TrackedEntity>,
}

impl EntityEntry {
    pub(crate) fn new(
        key: EntityKey,
        properties: BTreeSet<&'static str>,
        entity: Rc<dyn TrackedEntity>,
    ) -> Self {
        Self {
            key,
            properties,
            entity,
        }
    }

    pub fn key(&self) -> EntityKey {
        self.key
    }

    /// Changed property names; empty for deletions.
    pub fn properties(&self) -> &BTreeSet<&'static str> {
        &self.properties
    }

    pub fn table(&self) -> &TableMeta {
        self.entity.table()
    }

    /// The tracked handle, if the entry belongs to `T`.
    pub fn downcast<T: Entity>(&self) -> Option<Managed<T>> {
        downcast_handle(self.entity.as_ref())
    }

    pub(crate) fn row(&self) -> Result<EntityRow> {
        self.entity.row()
    }
}

impl std::fmt::Debug for EntityEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityEntry")
            .field("key", &self.key)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}
