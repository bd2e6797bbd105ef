//! Error taxonomy for the qlink core.
//!
//! - **Transport loss** is not an error: lost items arrive as `None`.
//! - **Protocol violations** on the arena are [`ArenaError`]s.
//! - **Agent failures** surface from the driver as [`SimError`].
//! - **Configuration errors** are [`ConfigError`]s, raised before any agent starts.

use crate::ownership::ParticleStatus;
use qlink_env::{AgentId, EnvError};
use thiserror::Error;

/// Invalid setup parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Systems must hold between 1 and `max` particles
    #[error("Invalid system size: {qubits} qubits (supported: 1..={max})")]
    SystemSize { qubits: usize, max: usize },

    /// The arena needs at least one system
    #[error("Arena must hold at least one system")]
    EmptyArena,

    /// A probability outside [0, 1]
    #[error("Invalid probability for {name}: {value}")]
    Probability { name: &'static str, value: f64 },

    /// Any other rejected numeric parameter
    #[error("Invalid parameter {name}: {reason}")]
    Parameter { name: &'static str, reason: String },

    /// The noise model only applies to quantum channels
    #[error("Noise model '{0}' cannot be used on a classical channel")]
    QuantumOnlyNoise(&'static str),

    /// Two agents share a name
    #[error("Duplicate agent: {0}")]
    DuplicateAgent(AgentId),

    /// An agent cannot be connected to itself
    #[error("Agent {0} cannot be connected to itself")]
    SelfConnection(AgentId),

    /// The two agents are already connected by a channel of this kind
    #[error("Agents {from} and {to} already have a {kind} channel")]
    DuplicateChannel { from: AgentId, to: AgentId, kind: &'static str },

    /// Agents bound to different arenas cannot exchange particles
    #[error("Agents {0} and {1} are bound to different arenas")]
    ArenaMismatch(AgentId, AgentId),

    /// The agent was built over another arena than the simulation's
    #[error("Agent {0} is bound to another arena")]
    ForeignArena(AgentId),

    /// The agent publishes into another sink than the simulation's
    #[error("Agent {0} publishes into another results sink")]
    ForeignSink(AgentId),

    /// A simulation with no agents
    #[error("Simulation has no agents")]
    NoAgents,
}

impl ConfigError {
    /// Creates a parameter error.
    pub fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Parameter { name, reason: reason.into() }
    }

    /// Validates a probability.
    pub fn check_probability(name: &'static str, value: f64) -> Result<f64, Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(Self::Probability { name, value })
        }
    }
}

impl From<EnvError> for ConfigError {
    fn from(err: EnvError) -> Self {
        Self::Parameter { name: "link", reason: err.to_string() }
    }
}

/// Errors raised by arena access through views and particle handles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArenaError {
    /// System index past the end of the arena
    #[error("System index {index} out of range (arena holds {count} systems)")]
    SystemOutOfRange { index: usize, count: usize },

    /// Particle index past the end of a system
    #[error("Particle index {index} out of range (systems hold {count} particles)")]
    ParticleOutOfRange { index: usize, count: usize },

    /// The caller does not hold the particle it tried to use
    #[error("Particle ({system}, {particle}) is not held by {holder}: {status}")]
    NotHolder {
        system: usize,
        particle: usize,
        holder: String,
        status: ParticleStatus,
    },

    /// The particle was lost in transit
    #[error("Particle ({system}, {particle}) was lost in transit")]
    ParticleLost { system: usize, particle: usize },

    /// A joint operation spans several systems
    #[error("Joint operation spans systems {0} and {1}")]
    NotSameSystem(usize, usize),

    /// The same particle appears twice in a joint operation
    #[error("Particle {0} appears more than once in a joint operation")]
    RepeatedParticle(usize),

    /// Operator size does not match the targeted particles
    #[error("Operator is {rows}x{cols}, expected {expected}x{expected}")]
    OperatorShape { rows: usize, cols: usize, expected: usize },
}

/// Errors raised by channel send/receive.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    /// No channel of this kind to the peer
    #[error("No {kind} channel to {peer}")]
    UnknownPeer { peer: AgentId, kind: &'static str },

    /// The peer terminated (normally or not) and nothing is left to receive
    #[error("Peer {peer} disconnected")]
    Disconnected { peer: AgentId },

    /// Nothing arrived before the deadline
    #[error("Timed out after {millis}ms waiting on {peer}")]
    Timeout { peer: AgentId, millis: u64 },

    /// The item could not be handed over (e.g. a particle the sender doesn't hold)
    #[error("Transfer to {peer} failed: {source}")]
    Transfer {
        peer: AgentId,
        #[source]
        source: ArenaError,
    },
}

impl ChannelError {
    /// Maps a link error onto the peer it concerns.
    pub fn from_env(peer: &AgentId, err: EnvError) -> Self {
        match err {
            EnvError::Timeout(millis) => Self::Timeout { peer: peer.clone(), millis },
            _ => Self::Disconnected { peer: peer.clone() },
        }
    }

    /// Returns true if this error only reflects another agent's termination.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

/// Errors from the results sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Results are write-once per agent
    #[error("Agent {0} already published its result")]
    AlreadyPublished(AgentId),
}

/// Errors a protocol routine can end with.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Application-level failure raised by the protocol itself
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl AgentError {
    /// Creates a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Returns true if this failure was caused by a peer terminating first.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Channel(err) if err.is_disconnect())
    }
}

/// Errors that abort a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A protocol routine returned an error
    #[error("Agent {agent} failed: {source}")]
    AgentFailed {
        agent: AgentId,
        #[source]
        source: AgentError,
    },

    /// A protocol routine panicked
    #[error("Agent {agent} panicked: {message}")]
    AgentPanicked { agent: AgentId, message: String },

    /// The OS refused to start the agent's thread
    #[error("Failed to start agent {agent}: {source}")]
    Spawn {
        agent: AgentId,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Returns the agent this failure is attributed to, if any.
    pub fn agent(&self) -> Option<&AgentId> {
        match self {
            Self::Config(_) => None,
            Self::AgentFailed { agent, .. }
            | Self::AgentPanicked { agent, .. }
            | Self::Spawn { agent, .. } => Some(agent),
        }
    }

    /// Returns true if this failure only reflects another agent's termination.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::AgentFailed { source, .. } if source.is_disconnect())
    }
}
