use crate::core::{PersistenceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Known to the context, no storage identity yet.
    New,
    /// Identity assigned, insert not yet confirmed.
    Saving,
    /// Persisted and subject to dirty checking.
    Managed,
    /// Tracked but never dirty and never flushed.
    ReadOnly,
    /// Marked for removal within the current unit of work.
    Deleted,
    /// Removal completed.
    Gone,
    /// Placeholder held while a row is being loaded.
    Loading,
}

impl Status {
    /// Applies `operation`, returning the next status or the rejection.
    pub fn transition(self, operation: LifecycleOp) -> Result<Status> {
        use LifecycleOp as Op;
        use Status::*;

        let next = match (self, operation) {
            (New, Op::AssignIdentity) => Saving,
            (Saving, Op::CompleteInsert) => Managed,
            (Loading | Managed, Op::CompleteLoad) => Managed,
            (Managed, Op::MarkDeleted) => Deleted,
            (Deleted, Op::CompleteDelete) => Gone,
            (Managed, Op::MarkReadOnly) => ReadOnly,
            (Managed, Op::Merge) => Managed,
            (status, operation) => {
                return Err(PersistenceError::InvalidLifecycleTransition { status, operation });
            }
        };
        Ok(next)
    }

    /// Whether a cached instance in this status may be handed to callers.
    pub fn is_readable(self) -> bool {
        matches!(self, Status::Managed | Status::ReadOnly | Status::Saving)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::New => "NEW",
            Status::Saving => "SAVING",
            Status::Managed => "MANAGED",
            Status::ReadOnly => "READ_ONLY",
            Status::Deleted => "DELETED",
            Status::Gone => "GONE",
            Status::Loading => "LOADING",
        };
        f.write_str(name)
    }
}

/// Operations that move an entity between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOp {
    AssignIdentity,
    CompleteInsert,
    CompleteLoad,
    MarkDeleted,
    CompleteDelete,
    MarkReadOnly,
    Merge,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleOp::AssignIdentity => "assign identity to",
            LifecycleOp::CompleteInsert => "complete insert of",
            LifecycleOp::CompleteLoad => "complete load of",
            LifecycleOp::MarkDeleted => "remove",
            LifecycleOp::CompleteDelete => "complete delete of",
            LifecycleOp::MarkReadOnly => "mark read-only",
            LifecycleOp::Merge => "merge",
        };
        f.write_str(name)
    }
}
