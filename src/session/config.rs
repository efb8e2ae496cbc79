use crate::core::{PersistenceError, Result};
use serde::{Deserialize, Serialize};

/// How `persist` obtains an identity for a new entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdGeneration {
    /// `SELECT MAX(id)` on the table plus one; an empty table starts at 1.
    #[default]
    MaxPlusOne,
    /// The entity carries its own identity.
    Assigned,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name reported in log spans
    pub name: String,

    /// Identity strategy for `persist`
    pub id_generation: IdGeneration,

    /// Log every statement at DEBUG
    pub log_sql: bool,
}

impl SessionConfig {
    /// Create a configuration with defaults
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id_generation: IdGeneration::default(),
            log_sql: true,
        }
    }

    /// Set the identity strategy
    pub fn id_generation(mut self, id_generation: IdGeneration) -> Self {
        self.id_generation = id_generation;
        self
    }

    /// Enable or disable statement logging
    pub fn log_sql(mut self, log_sql: bool) -> Self {
        self.log_sql = log_sql;
        self
    }

    /// Read a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)
            .map_err(|e| PersistenceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PersistenceError::Config("session name cannot be empty".into()));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
