mod config;
mod loader;
mod manager;
mod persister;
#[allow(clippy::module_inception)]
mod session;

pub use config::{IdGeneration, SessionConfig};
pub use manager::EntityManager;
pub use persister::EntityPersister;
pub use session::{FlushSummary, Session};
