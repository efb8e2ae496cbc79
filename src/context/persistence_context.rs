use super::record::{EntityRecord, TrackedEntity, TrackedHandle, downcast_handle};
use super::{EntityEntry, EntityKey, Managed, Snapshot, Status};
use crate::core::{PersistenceError, Result};
use crate::metadata::{Entity, EntityMeta, EntityRegistry};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{Level, event};

/// Identity map and lifecycle tracker for one session.
///
/// Each [`EntityKey`] maps to at most one record, so at most one instance
/// exists per identity. Records in status `Gone` are evicted immediately.
#[derive(Default)]
pub struct PersistenceContext {
    registry: EntityRegistry,
    records: HashMap<EntityKey, EntityRecord>,
}

impl PersistenceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Entity>(&mut self) -> Result<Rc<EntityMeta<T>>> {
        self.registry.register::<T>()
    }

    pub fn meta<T: Entity>(&self) -> Result<Rc<EntityMeta<T>>> {
        self.registry.meta::<T>()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Builds the key for `id`. `None` and `0` count as absent.
    pub fn make_key<T: Entity>(&self, id: Option<i64>) -> Result<EntityKey> {
        let meta = self.meta::<T>()?;
        match id.filter(|id| *id != 0) {
            Some(id) => Ok(EntityKey::new(meta.entity_name(), id)),
            None => Err(PersistenceError::MissingIdentity {
                entity: meta.entity_name().to_string(),
            }),
        }
    }

    /// Key for the identity currently held by `entity`.
    pub fn key_of<T: Entity>(&self, entity: &Managed<T>) -> Result<EntityKey> {
        let meta = self.meta::<T>()?;
        let id = meta.identity_of(&*entity.read()?);
        self.make_key::<T>(id)
    }

    pub fn lookup<T: Entity>(&self, key: &EntityKey) -> Option<Managed<T>> {
        self.records
            .get(key)
            .and_then(EntityRecord::entity)
            .and_then(|entity| downcast_handle(entity.as_ref()))
    }

    pub fn contains<T: Entity>(&self, id: i64) -> Result<bool> {
        let key = self.make_key::<T>(Some(id))?;
        Ok(self.records.contains_key(&key))
    }

    pub fn contains_key(&self, key: &EntityKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn status_of(&self, key: &EntityKey) -> Option<Status> {
        self.records.get(key).map(EntityRecord::status)
    }

    pub fn snapshot_of(&self, key: &EntityKey) -> Option<&Snapshot> {
        self.records.get(key).and_then(EntityRecord::snapshot)
    }

    /// Reserves `id` with a `Loading` placeholder.
    pub fn begin_load<T: Entity>(&mut self, id: i64) -> Result<EntityKey> {
        let key = self.make_key::<T>(Some(id))?;
        self.ensure_vacant(&key)?;
        self.records.insert(key, EntityRecord::loading());
        event!(Level::TRACE, key = %key, "load started");
        Ok(key)
    }

    /// Installs a freshly loaded instance and captures its snapshot.
    pub fn complete_load<T: Entity>(&mut self, key: &EntityKey, entity: Managed<T>) -> Result<Managed<T>> {
        let tracked = self.track(entity.clone())?;
        let record = self.record_mut(key)?;
        record.complete_load(key, tracked)?;
        Ok(entity)
    }

    /// Drops a `Loading` placeholder. Other records are left alone.
    pub fn abort_load(&mut self, key: &EntityKey) -> bool {
        if self.status_of(key) == Some(Status::Loading) {
            self.records.remove(key);
            event!(Level::TRACE, key = %key, "load aborted");
            return true;
        }
        false
    }

    /// Registers `entity` under `id` and moves it to `Saving`.
    pub fn begin_save<T: Entity>(&mut self, entity: &Managed<T>, id: i64) -> Result<EntityKey> {
        let key = self.make_key::<T>(Some(id))?;
        self.ensure_vacant(&key)?;
        let mut record = EntityRecord::transient(self.track(entity.clone())?);
        record.assign_identity(&key)?;
        self.records.insert(key, record);
        Ok(key)
    }

    pub fn complete_save(&mut self, key: &EntityKey) -> Result<()> {
        self.record_mut(key)?.complete_insert(key)
    }

    /// Rolls back a registration made by [`begin_save`](Self::begin_save).
    pub fn fail_save(&mut self, key: &EntityKey) -> bool {
        if matches!(self.status_of(key), Some(Status::New | Status::Saving)) {
            self.records.remove(key);
            event!(Level::TRACE, key = %key, "save rolled back");
            return true;
        }
        false
    }

    pub fn mark_deleted(&mut self, key: &EntityKey) -> Result<()> {
        self.record_mut(key)?.mark_deleted(key)
    }

    /// Moves a deleted record to `Gone` and evicts it.
    pub fn complete_delete(&mut self, key: &EntityKey) -> Result<()> {
        self.record_mut(key)?.complete_delete(key)?;
        self.records.remove(key);
        Ok(())
    }

    pub fn mark_read_only(&mut self, key: &EntityKey) -> Result<()> {
        self.record_mut(key)?.mark_read_only(key)
    }

    /// Tracks `entity` as managed under `key`, with a snapshot of its
    /// current state.
    ///
    /// An untracked key gets a new record. A tracked key must be `Managed`;
    /// its record then points at `entity`.
    pub fn mark_managed<T: Entity>(&mut self, key: &EntityKey, entity: &Managed<T>) -> Result<()> {
        let tracked = self.track(entity.clone())?;
        match self.records.get_mut(key) {
            Some(record) => record.merge(key, tracked),
            None => {
                let mut record = EntityRecord::transient(tracked);
                record.assign_identity(key)?;
                record.complete_insert(key)?;
                self.records.insert(*key, record);
                Ok(())
            }
        }
    }

    pub fn refresh_snapshot(&mut self, key: &EntityKey) -> Result<()> {
        self.record_mut(key)?.refresh_snapshot()
    }

    /// Managed entities whose state differs from their snapshot, in key order.
    pub fn collect_dirty(&self) -> Result<Vec<EntityEntry>> {
        let mut dirty = Vec::new();
        for (key, record) in &self.records {
            let properties = record.dirty_properties()?;
            if properties.is_empty() {
                continue;
            }
            if let Some(entity) = record.entity() {
                dirty.push(EntityEntry::new(*key, properties, Rc::clone(entity)));
            }
        }
        dirty.sort_by_key(EntityEntry::key);
        Ok(dirty)
    }

    /// Entities marked for removal, in key order.
    pub fn collect_deleted(&self) -> Vec<EntityEntry> {
        let mut deleted: Vec<_> = self
            .records
            .iter()
            .filter(|(_, record)| record.status() == Status::Deleted)
            .filter_map(|(key, record)| {
                record
                    .entity()
                    .map(|entity| EntityEntry::new(*key, Default::default(), Rc::clone(entity)))
            })
            .collect();
        deleted.sort_by_key(EntityEntry::key);
        deleted
    }

    /// Stops tracking `key`. The instance itself is untouched.
    pub fn detach(&mut self, key: &EntityKey) -> bool {
        self.records.remove(key).is_some()
    }

    /// Forgets every record. Registered kinds stay registered.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn track<T: Entity>(&self, handle: Managed<T>) -> Result<Rc<dyn TrackedEntity>> {
        let meta = self.meta::<T>()?;
        Ok(Rc::new(TrackedHandle { handle, meta }))
    }

    fn ensure_vacant(&self, key: &EntityKey) -> Result<()> {
        if self.records.contains_key(key) {
            return Err(PersistenceError::DuplicateIdentity(*key));
        }
        Ok(())
    }

    fn record_mut(&mut self, key: &EntityKey) -> Result<&mut EntityRecord> {
        self.records
            .get_mut(key)
            .ok_or_else(|| PersistenceError::IllegalManagedState(format!("{key} is not tracked")))
    }
}

impl std::fmt::Debug for PersistenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.records.keys().collect();
        keys.sort();
        f.debug_struct("PersistenceContext")
            .field("registry", &self.registry)
            .field("keys", &keys)
            .finish()
    }
}
