//! qlink Core
//!
//! Parallel agents exchanging references into one shared quantum arena.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Simulation                           │
//! │                                                               │
//! │   ┌─────────┐   quantum / classical channels   ┌─────────┐    │
//! │   │  Agent  │◄────────────────────────────────►│  Agent  │ …  │
//! │   │ thread  │   (FIFO, delay, error pipeline)  │ thread  │    │
//! │   └────┬────┘                                  └────┬────┘    │
//! │        │ ParticleRef / SystemView                   │         │
//! │   ┌────▼────────────────────────────────────────────▼────┐    │
//! │   │ QuantumArena: N density matrices + ownership ledger  │    │
//! │   └──────────────────────────────────────────────────────┘    │
//! │        │ publish (write-once)                                 │
//! │   ┌────▼────────┐                                             │
//! │   │ ResultsSink │ ──▶ Results, read after every agent joined  │
//! │   └─────────────┘                                             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Only handles travel over channels; the matrices stay in the arena.
//! - A [`ParticleRef`] is move-only and the arena's ownership ledger checks
//!   that whoever operates on a particle actually holds it.
//! - Every agent runs on its own OS thread with its own logical clock and a
//!   ChaCha8 RNG derived from the simulation seed.
//!
//! # Example
//!
//! ```
//! use qlink_core::{gates, qconnect, ChannelConfig, QuantumArena, Simulation};
//!
//! let arena = QuantumArena::allocate(2, 1).unwrap();
//! let mut sim = Simulation::<u8, u8>::new(&arena, 1);
//!
//! let mut alice = sim.agent("Alice", |ctx| {
//!     let mut system = ctx.system(0)?;
//!     let mut qubits = system.qubits();
//!     let (a, b) = (qubits.next().unwrap(), qubits.next().unwrap());
//!     gates::h(&a)?;
//!     gates::cnot_on(&a, &b)?;
//!     ctx.qsend("Bob", b)?;
//!     let bit = ctx.measure(a)?;
//!     ctx.output(bit)?;
//!     Ok(())
//! });
//! let mut bob = sim.agent("Bob", |ctx| {
//!     let b = ctx.qrecv("Alice")?.expect("lossless");
//!     let bit = ctx.measure(b)?;
//!     ctx.output(bit)?;
//!     Ok(())
//! });
//! qconnect(&mut alice, &mut bob, &ChannelConfig::new(10.0)).unwrap();
//! sim.add(alice).unwrap();
//! sim.add(bob).unwrap();
//!
//! let report = sim.run().unwrap();
//! assert_eq!(report.results.get("Alice"), report.results.get("Bob"));
//! ```

pub mod agent;
pub mod arena;
pub mod backend;
pub mod channel;
pub mod error;
pub mod gates;
pub mod linalg;
pub mod noise;
pub mod ownership;
pub mod simulation;
pub mod sink;
pub mod stream;
pub mod system;
pub mod transmit;

pub use agent::{Agent, AgentContext, AgentHandle, AgentReport, AgentState, Protocol};
pub use arena::{QuantumArena, MAX_QUBITS_PER_SYSTEM};
pub use backend::{DensityMatrixBackend, QuantumBackend};
pub use channel::{
    cconnect, cconnect_with, connect, qconnect, qconnect_with, ChannelConfig, ChannelKind,
    ChannelStats,
};
pub use error::{AgentError, ArenaError, ChannelError, ConfigError, SimError, SinkError};
pub use linalg::Operator;
pub use noise::{ErrorModel, ErrorPipeline, NoiseSpec};
pub use ownership::{Holder, ParticleStatus};
pub use simulation::{Simulation, SimulationReport};
pub use sink::{Progress, ProgressBoard, ProgressEntry, Results, ResultsSink};
pub use stream::SystemStream;
pub use system::{ParticleRef, Qubits, SystemView};
pub use transmit::Transmit;

pub use qlink_env::{AgentId, SeedSequence, DEFAULT_PULSE_LENGTH};
