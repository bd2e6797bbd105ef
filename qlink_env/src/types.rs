//! Common types for the qlink environment layer.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Unique identifier for an agent.
///
/// Agents are identified by name ("Alice", "Bob", ...). Channel tables and
/// the results sink are keyed by this type, and lookups accept a plain `&str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Creates an identifier from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AgentId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope for an item in transit between two agents.
///
/// The payload is `None` when the item was lost on the way. Lost items
/// still travel through the link so the receiver observes them in order
/// and its clock still advances.
#[derive(Debug)]
pub struct Envelope<T> {
    /// The transmitted item, or `None` if it was lost
    pub payload: Option<T>,

    /// Sender's clock (seconds) right after the item was emitted
    pub sent_at: f64,

    /// Simulated time (seconds) at which the item reaches the receiver
    pub arrival: f64,

    /// Per-link sequence number, starting at 0
    pub seq: u64,
}

impl<T> Envelope<T> {
    /// Creates a new envelope.
    pub fn new(payload: Option<T>, sent_at: f64, propagation_delay: f64, seq: u64) -> Self {
        Self {
            payload,
            sent_at,
            arrival: sent_at + propagation_delay,
            seq,
        }
    }

    /// Returns true if the payload was lost in transit.
    pub fn is_lost(&self) -> bool {
        self.payload.is_none()
    }
}
