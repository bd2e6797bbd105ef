//! Harness error types.

use qlink_core::{ArenaError, ConfigError, SimError};
use thiserror::Error;

/// Errors raised while setting up or running a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid harness setting {name}: {reason}")]
    Setting { name: &'static str, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("agent {0} published no result")]
    MissingResult(String),
}

impl HarnessError {
    pub fn setting(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Setting { name, reason: reason.into() }
    }
}
