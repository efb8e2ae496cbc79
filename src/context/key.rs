use serde::Serialize;
use std::fmt;

/// Identifies one conceptual row: the entity kind plus its identity value.
///
/// Keys are only built for registered kinds and non-zero identities; see
/// [`PersistenceContext::make_key`](super::PersistenceContext::make_key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityKey {
    entity: &'static str,
    id: i64,
}

impl EntityKey {
    pub(crate) fn new(entity: &'static str, id: i64) -> Self {
        Self { entity, id }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}
