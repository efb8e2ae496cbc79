use super::config::{IdGeneration, SessionConfig};
use super::persister::EntityPersister;
use crate::context::{EntityEntry, EntityKey, Managed, PersistenceContext, Status};
use crate::core::{PersistenceError, Result, StorageError};
use crate::metadata::{Entity, EntityMeta};
use crate::sql::{DmlQueryBuilder, SqlBuilder};
use crate::storage::SqlExecutor;
use serde::Serialize;
use tracing::{Level, event, info_span};

/// Statements issued by one [`Session::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub updated: usize,
    pub deleted: usize,
}

/// Unit of work over one executor.
///
/// Owns the persistence context, so every identity maps to at most one
/// instance for the lifetime of the session. Changes to managed entities
/// reach storage on [`flush`](Self::flush); removals are deferred the same
/// way.
pub struct Session<E, B = DmlQueryBuilder> {
    config: SessionConfig,
    context: PersistenceContext,
    persister: EntityPersister<E, B>,
}

impl<E: SqlExecutor> Session<E> {
    pub fn new(executor: E) -> Self {
        Self::from_parts(executor, DmlQueryBuilder, SessionConfig::default())
    }

    pub fn with_config(executor: E, config: SessionConfig) -> Result<Self> {
        Self::with_builder(executor, DmlQueryBuilder, config)
    }
}

impl<E: SqlExecutor, B: SqlBuilder> Session<E, B> {
    pub fn with_builder(executor: E, builder: B, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(executor, builder, config))
    }

    fn from_parts(executor: E, builder: B, config: SessionConfig) -> Self {
        let persister = EntityPersister::new(executor, builder, config.log_sql);
        event!(Level::DEBUG, session = %config.name, id_generation = ?config.id_generation, "session opened");
        Self {
            config,
            context: PersistenceContext::new(),
            persister,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn context(&self) -> &PersistenceContext {
        &self.context
    }

    pub fn executor(&self) -> &E {
        self.persister.executor()
    }

    pub fn executor_mut(&mut self) -> &mut E {
        self.persister.executor_mut()
    }

    /// Makes `T` known to this session. Idempotent.
    pub fn register<T: Entity>(&mut self) -> Result<()> {
        self.context.register::<T>()?;
        Ok(())
    }

    pub fn create_table<T: Entity>(&mut self) -> Result<()> {
        let meta = self.context.meta::<T>()?;
        self.persister.create_table(meta.table())
    }

    pub fn drop_table<T: Entity>(&mut self) -> Result<()> {
        let meta = self.context.meta::<T>()?;
        self.persister.drop_table(meta.table())
    }

    /// Inserts a new entity and starts tracking it.
    ///
    /// An entity whose identity is already tracked is left alone. On failure
    /// the registration is rolled back and the entity keeps its prior state.
    pub fn persist<T: Entity>(&mut self, entity: &Managed<T>) -> Result<()> {
        let meta = self.context.meta::<T>()?;
        let current = meta.identity_of(&*entity.read()?);
        if let Some(id) = current {
            let key = self.context.make_key::<T>(Some(id))?;
            if self.context.contains_key(&key) {
                event!(Level::DEBUG, key = %key, "entity already tracked");
                return Ok(());
            }
        }

        let id = match self.config.id_generation {
            IdGeneration::Assigned => current.ok_or_else(|| PersistenceError::MissingIdentity {
                entity: meta.entity_name().to_string(),
            })?,
            IdGeneration::MaxPlusOne => {
                let next = self.persister.max_id(meta.table()).and_then(|max| {
                    max.checked_add(1).ok_or_else(|| {
                        StorageError::ConstraintViolation(format!(
                            "identity space of table '{}' exhausted",
                            meta.table().table_name()
                        ))
                        .into()
                    })
                });
                match next {
                    Ok(id) => id,
                    Err(err) => return Err(persist_failed(&meta, err)),
                }
            }
        };

        let original = entity.read()?.clone();
        meta.assign_identity(&mut *entity.write()?, id);
        let key = match self.context.begin_save(entity, id) {
            Ok(key) => key,
            Err(err) => {
                restore(entity, original);
                return Err(persist_failed(&meta, err));
            }
        };

        if let Err(err) = self.insert_saving(&meta, entity, &key) {
            self.context.fail_save(&key);
            restore(entity, original);
            return Err(persist_failed(&meta, err));
        }
        event!(Level::DEBUG, key = %key, "entity persisted");
        Ok(())
    }

    fn insert_saving<T: Entity>(
        &mut self,
        meta: &EntityMeta<T>,
        entity: &Managed<T>,
        key: &EntityKey,
    ) -> Result<()> {
        let row = meta.row_of(&*entity.read()?);
        self.persister.insert(meta.table(), &row)?;
        self.context.complete_save(key)
    }

    /// Returns the tracked instance for `id`, loading it on a miss.
    pub fn find<T: Entity>(&mut self, id: i64) -> Result<Managed<T>> {
        let key = self.context.make_key::<T>(Some(id))?;
        match self.context.status_of(&key) {
            Some(status) if status.is_readable() => {
                if let Some(cached) = self.context.lookup::<T>(&key) {
                    event!(Level::TRACE, key = %key, "identity map hit");
                    return Ok(cached);
                }
            }
            Some(Status::Deleted) => return Err(PersistenceError::NotFound(key)),
            _ => {}
        }

        let meta = self.context.meta::<T>()?;
        self.context.begin_load::<T>(id)?;
        let loaded = match self.persister.select(&meta, id) {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                self.context.abort_load(&key);
                return Err(PersistenceError::NotFound(key));
            }
            Err(err) => {
                self.context.abort_load(&key);
                event!(Level::ERROR, key = %key, error = %err, "load failed");
                return Err(err);
            }
        };

        self.context
            .complete_load(&key, Managed::new(loaded))
            .inspect_err(|_| {
                self.context.abort_load(&key);
            })
    }

    /// Loads every row of `T`. Rows already tracked resolve to the tracked
    /// instance; rows pending removal are skipped.
    pub fn find_all<T: Entity>(&mut self) -> Result<Vec<Managed<T>>> {
        let meta = self.context.meta::<T>()?;
        let rows = self.persister.select_all(&meta)?;

        let mut found = Vec::with_capacity(rows.len());
        for entity in rows {
            let key = self.context.make_key::<T>(meta.identity_of(&entity))?;
            match self.context.status_of(&key) {
                Some(Status::Deleted) => continue,
                Some(_) => found.extend(self.context.lookup::<T>(&key)),
                None => {
                    self.context.begin_load::<T>(key.id())?;
                    match self.context.complete_load(&key, Managed::new(entity)) {
                        Ok(handle) => found.push(handle),
                        Err(err) => {
                            self.context.abort_load(&key);
                            return Err(err);
                        }
                    }
                }
            }
        }
        Ok(found)
    }

    /// Schedules a managed entity for deletion at the next flush.
    pub fn remove<T: Entity>(&mut self, entity: &Managed<T>) -> Result<()> {
        let key = self.tracked_key(entity)?;
        self.context.mark_deleted(&key)?;
        event!(Level::DEBUG, key = %key, "entity scheduled for removal");
        Ok(())
    }

    /// Reconciles `entity` with the context.
    ///
    /// For a tracked identity the given state is copied into the tracked
    /// instance, which is returned and treated as clean. An untracked entity
    /// is persisted.
    pub fn merge<T: Entity>(&mut self, entity: &Managed<T>) -> Result<Managed<T>> {
        let meta = self.context.meta::<T>()?;
        if let Some(id) = meta.identity_of(&*entity.read()?) {
            let key = self.context.make_key::<T>(Some(id))?;
            if let Some(status) = self.context.status_of(&key) {
                if status != Status::Managed {
                    return Err(PersistenceError::InvalidLifecycleTransition {
                        status,
                        operation: crate::context::LifecycleOp::Merge,
                    });
                }
                let cached = self.context.lookup::<T>(&key).ok_or_else(|| {
                    PersistenceError::IllegalManagedState(format!("{key} has no tracked instance"))
                })?;
                if !cached.ptr_eq(entity) {
                    let state = entity.read()?.clone();
                    *cached.write()? = state;
                }
                self.context.mark_managed(&key, &cached)?;
                event!(Level::DEBUG, key = %key, "entity merged");
                return Ok(cached);
            }
        }

        self.persist(entity)?;
        let key = self.context.key_of(entity)?;
        self.context.mark_managed(&key, entity)?;
        Ok(entity.clone())
    }

    /// Writes pending changes: one update per dirty entity, then the
    /// scheduled deletes, each in key order.
    ///
    /// Stops at the first failure. Statements already issued stay applied;
    /// the failed entry and everything after it remain pending.
    pub fn flush(&mut self) -> Result<FlushSummary> {
        let span = info_span!("memoorm.flush", session = %self.config.name);
        let _enter = span.enter();

        let mut summary = FlushSummary::default();
        for entry in self.context.collect_dirty()? {
            if let Err(err) = self.flush_update(&entry) {
                event!(Level::ERROR, key = %entry.key(), error = %err, "flush update failed");
                return Err(PersistenceError::flush_failed(entry.key(), err));
            }
            summary.updated += 1;
        }

        for entry in self.context.collect_deleted() {
            if let Err(err) = self.flush_delete(&entry) {
                event!(Level::ERROR, key = %entry.key(), error = %err, "flush delete failed");
                return Err(PersistenceError::flush_failed(entry.key(), err));
            }
            summary.deleted += 1;
        }

        event!(Level::DEBUG, updated = summary.updated, deleted = summary.deleted, "flush complete");
        Ok(summary)
    }

    fn flush_update(&mut self, entry: &EntityEntry) -> Result<()> {
        let key = entry.key();
        let row = entry.row()?;
        let affected = self.persister.update(entry.table(), &row, key.id())?;
        if affected == 0 {
            return Err(PersistenceError::NotFound(key));
        }
        self.context.refresh_snapshot(&key)
    }

    fn flush_delete(&mut self, entry: &EntityEntry) -> Result<()> {
        let key = entry.key();
        self.persister.delete(entry.table(), key.id())?;
        self.context.complete_delete(&key)
    }

    /// Excludes a managed entity from dirty checking for good.
    pub fn mark_read_only<T: Entity>(&mut self, entity: &Managed<T>) -> Result<()> {
        let key = self.tracked_key(entity)?;
        self.context.mark_read_only(&key)
    }

    pub fn contains<T: Entity>(&self, entity: &Managed<T>) -> Result<bool> {
        let meta = self.context.meta::<T>()?;
        match meta.identity_of(&*entity.read()?) {
            Some(id) => self.context.contains::<T>(id),
            None => Ok(false),
        }
    }

    pub fn status_of<T: Entity>(&self, id: i64) -> Result<Option<Status>> {
        let key = self.context.make_key::<T>(Some(id))?;
        Ok(self.context.status_of(&key))
    }

    /// Stops tracking `entity`. Pending changes to it are dropped.
    pub fn detach<T: Entity>(&mut self, entity: &Managed<T>) -> Result<bool> {
        let meta = self.context.meta::<T>()?;
        match meta.identity_of(&*entity.read()?) {
            Some(id) => {
                let key = self.context.make_key::<T>(Some(id))?;
                Ok(self.context.detach(&key))
            }
            None => Ok(false),
        }
    }

    /// Detaches everything. Unflushed changes are discarded.
    pub fn clear(&mut self) {
        event!(Level::DEBUG, session = %self.config.name, tracked = self.context.len(), "session cleared");
        self.context.clear();
    }

    /// Ends the session without flushing and hands back the executor.
    pub fn close(self) -> E {
        event!(Level::DEBUG, session = %self.config.name, "session closed");
        self.persister.into_executor()
    }

    fn tracked_key<T: Entity>(&self, entity: &Managed<T>) -> Result<EntityKey> {
        let meta = self.context.meta::<T>()?;
        let Some(id) = meta.identity_of(&*entity.read()?) else {
            return Err(PersistenceError::IllegalManagedState(format!(
                "{} without identity is not managed",
                meta.entity_name()
            )));
        };
        let key = self.context.make_key::<T>(Some(id))?;
        if !self.context.contains_key(&key) {
            return Err(PersistenceError::IllegalManagedState(format!(
                "{key} is not managed by this session"
            )));
        }
        Ok(key)
    }
}

fn persist_failed<T: Entity>(meta: &EntityMeta<T>, err: PersistenceError) -> PersistenceError {
    event!(Level::ERROR, entity = meta.entity_name(), error = %err, "persist failed");
    PersistenceError::persist_failed(meta.entity_name(), err)
}

fn restore<T>(entity: &Managed<T>, original: T) {
    if let Ok(mut state) = entity.write() {
        *state = original;
    }
}
