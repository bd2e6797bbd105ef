//! Error types for the qlink environment layer.

use thiserror::Error;

/// Errors that can occur on a link between two agents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// The other end of the link was dropped (its agent terminated)
    #[error("Link disconnected")]
    Disconnected,

    /// No envelope arrived before the deadline
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// A link or clock parameter was rejected
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl EnvError {
    /// Creates an invalid parameter error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates a timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration.as_millis() as u64)
    }
}
