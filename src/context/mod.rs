mod key;
mod managed;
mod persistence_context;
mod record;
mod snapshot;
mod status;

pub use key::EntityKey;
pub use managed::Managed;
pub use persistence_context::PersistenceContext;
pub use record::EntityEntry;
pub use snapshot::Snapshot;
pub use status::{LifecycleOp, Status};
