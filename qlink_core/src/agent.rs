//! Agents: one protocol routine on one OS thread.
//!
//! An [`Agent`] is built by the driver, wired to its peers with the connect
//! functions in [`channel`](crate::channel), and started. Once running, the
//! protocol only sees its [`AgentContext`]: the shared arena, its own clock
//! and RNG, and the channel endpoints keyed by peer id.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──start()──▶ Running ──Ok──▶ Terminated
//!                         │
//!                         └──Err / panic──▶ Failed
//! ```
//!
//! When the thread ends, for whatever reason, its channel endpoints are
//! dropped and every peer waiting on it gets `ChannelError::Disconnected`.

use crate::arena::QuantumArena;
use crate::channel::{ChannelKind, ChannelRx, ChannelTx};
use crate::error::{AgentError, ArenaError, ChannelError, SimError, SinkError};
use crate::ownership::Holder;
use crate::sink::{Progress, ResultsSink};
use crate::stream::SystemStream;
use crate::system::{ParticleRef, SystemView};
use crate::transmit::Transmit;
use qlink_env::{AgentId, LogicalClock, SeedSequence, DEFAULT_PULSE_LENGTH};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Master seed used when an agent is built without one.
pub const DEFAULT_SEED: u64 = 42;

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Created,
    Running,
    Terminated,
    Failed,
}

impl AgentState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Terminated,
            _ => Self::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Running => 1,
            Self::Terminated => 2,
            Self::Failed => 3,
        }
    }

    /// Returns true once the agent has stopped, normally or not.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }
}

#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(AgentState::Created.as_u8())))
    }

    fn get(&self) -> AgentState {
        AgentState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: AgentState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// A protocol routine.
///
/// Implemented for every `FnMut(&mut AgentContext<M, R>) -> Result<(), AgentError>`
/// closure, so most protocols are just closures.
pub trait Protocol<M, R>: Send + 'static {
    fn run(&mut self, ctx: &mut AgentContext<M, R>) -> Result<(), AgentError>;
}

impl<M, R, F> Protocol<M, R> for F
where
    F: FnMut(&mut AgentContext<M, R>) -> Result<(), AgentError> + Send + 'static,
{
    fn run(&mut self, ctx: &mut AgentContext<M, R>) -> Result<(), AgentError> {
        self(ctx)
    }
}

/// Per-agent traffic summary, returned by [`AgentHandle::join`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    /// Agent identifier
    pub id: AgentId,

    /// Logical clock at termination (seconds)
    pub final_time: f64,

    /// Items emitted on all outbound channels
    pub sent: u64,

    /// Of those, items lost in transit
    pub lost: u64,

    /// Items delivered on all inbound channels
    pub received: u64,

    /// Of those, items that arrived lost
    pub received_lost: u64,
}

/// An agent that has not been started yet.
pub struct Agent<M, R> {
    id: AgentId,
    holder: Holder,
    arena: Arc<QuantumArena>,
    sink: ResultsSink<R>,
    protocol: Box<dyn Protocol<M, R>>,
    pulse_length: f64,
    seeds: SeedSequence,
    quantum_out: HashMap<AgentId, ChannelTx<ParticleRef>>,
    quantum_in: HashMap<AgentId, ChannelRx<ParticleRef>>,
    classical_out: HashMap<AgentId, ChannelTx<M>>,
    classical_in: HashMap<AgentId, ChannelRx<M>>,
    state: SharedState,
}

impl<M: Transmit, R: Send + 'static> Agent<M, R> {
    /// Creates an agent bound to `arena` that publishes into `sink`, running
    /// a protocol closure.
    pub fn new<F>(name: impl Into<AgentId>, arena: &Arc<QuantumArena>, sink: &ResultsSink<R>, protocol: F) -> Self
    where
        F: FnMut(&mut AgentContext<M, R>) -> Result<(), AgentError> + Send + 'static,
    {
        Self::from_protocol(name, arena, sink, protocol)
    }

    /// Like [`new`](Self::new), for any [`Protocol`] implementation.
    pub fn from_protocol<P>(name: impl Into<AgentId>, arena: &Arc<QuantumArena>, sink: &ResultsSink<R>, protocol: P) -> Self
    where
        P: Protocol<M, R>,
    {
        let id = name.into();
        let seeds = SeedSequence::new(DEFAULT_SEED).child(id.as_str());
        Self {
            holder: arena.register_holder(),
            arena: Arc::clone(arena),
            sink: sink.clone(),
            protocol: Box::new(protocol),
            pulse_length: DEFAULT_PULSE_LENGTH,
            seeds,
            quantum_out: HashMap::new(),
            quantum_in: HashMap::new(),
            classical_out: HashMap::new(),
            classical_in: HashMap::new(),
            state: SharedState::new(),
            id,
        }
    }

    /// Derives this agent's random streams from `master`.
    ///
    /// Channels take their RNG when they are connected, so set the seed first.
    pub fn with_seed(mut self, master: u64) -> Self {
        self.seeds = SeedSequence::new(master).child(self.id.as_str());
        self
    }

    /// Sets the default pulse length (seconds) for this agent's sends.
    ///
    /// # Errors
    /// Rejects non-finite or non-positive lengths.
    pub fn with_pulse_length(mut self, pulse_length: f64) -> Result<Self, crate::error::ConfigError> {
        self.pulse_length = qlink_env::validate_pulse_length(pulse_length)?;
        Ok(self)
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn holder(&self) -> Holder {
        self.holder
    }

    pub fn arena(&self) -> &Arc<QuantumArena> {
        &self.arena
    }

    pub fn state(&self) -> AgentState {
        self.state.get()
    }

    pub fn pulse_length(&self) -> f64 {
        self.pulse_length
    }

    pub(crate) fn seeds(&self) -> &SeedSequence {
        &self.seeds
    }

    pub(crate) fn sink(&self) -> &ResultsSink<R> {
        &self.sink
    }

    pub(crate) fn is_connected(&self, peer: &AgentId, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Quantum => self.quantum_out.contains_key(peer),
            ChannelKind::Classical => self.classical_out.contains_key(peer),
        }
    }

    pub(crate) fn attach_quantum(&mut self, tx: ChannelTx<ParticleRef>, rx: ChannelRx<ParticleRef>) {
        self.quantum_out.insert(tx.peer().clone(), tx);
        self.quantum_in.insert(rx.peer().clone(), rx);
    }

    pub(crate) fn attach_classical(&mut self, tx: ChannelTx<M>, rx: ChannelRx<M>) {
        self.classical_out.insert(tx.peer().clone(), tx);
        self.classical_in.insert(rx.peer().clone(), rx);
    }

    /// Returns the peers this agent has a channel of `kind` to, sorted.
    pub fn peers(&self, kind: ChannelKind) -> Vec<&AgentId> {
        let mut peers: Vec<_> = match kind {
            ChannelKind::Quantum => self.quantum_out.keys().collect(),
            ChannelKind::Classical => self.classical_out.keys().collect(),
        };
        peers.sort();
        peers
    }

    /// Starts the protocol on its own named thread.
    ///
    /// # Errors
    /// `SimError::Spawn` if the OS refuses the thread. The agent's channels
    /// are dropped in that case, so its peers see a disconnection.
    pub fn start(self) -> Result<AgentHandle, SimError> {
        let Agent {
            id,
            holder,
            arena,
            sink,
            mut protocol,
            pulse_length,
            seeds,
            quantum_out,
            quantum_in,
            classical_out,
            classical_in,
            state,
        } = self;

        let progress = sink.register(&id, arena.system_count());
        let mut ctx = AgentContext {
            id: id.clone(),
            holder,
            arena,
            sink,
            clock: LogicalClock::new(),
            pulse_length,
            rng: seeds.rng("agent"),
            quantum_out,
            quantum_in,
            classical_out,
            classical_in,
            quantum_memory: HashMap::new(),
            classical_memory: HashMap::new(),
            progress,
        };

        state.set(AgentState::Running);
        let thread_state = state.clone();
        let thread = thread::Builder::new()
            .name(format!("agent-{id}"))
            .spawn(move || {
                let span = tracing::info_span!("agent", name = %ctx.id);
                let _enter = span.enter();
                info!("agent started");

                let outcome = protocol.run(&mut ctx);
                let report = ctx.report();
                match &outcome {
                    Ok(()) => {
                        thread_state.set(AgentState::Terminated);
                        info!(final_time = report.final_time, sent = report.sent, "agent terminated");
                    }
                    Err(err) => {
                        thread_state.set(AgentState::Failed);
                        warn!(%err, "agent failed");
                    }
                }
                // Dropping the context closes every endpoint
                drop(ctx);
                outcome.map(|()| report)
            });

        match thread {
            Ok(thread) => Ok(AgentHandle { id, state, thread }),
            Err(source) => {
                state.set(AgentState::Failed);
                Err(SimError::Spawn { agent: id, source })
            }
        }
    }
}

impl<M, R> fmt::Debug for Agent<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("holder", &self.holder)
            .field("state", &self.state.get())
            .field("quantum_peers", &self.quantum_out.len())
            .field("classical_peers", &self.classical_out.len())
            .finish()
    }
}

/// Handle to a running agent.
#[derive(Debug)]
pub struct AgentHandle {
    id: AgentId,
    state: SharedState,
    thread: JoinHandle<Result<AgentReport, AgentError>>,
}

impl AgentHandle {
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn state(&self) -> AgentState {
        self.state.get()
    }

    /// Returns true once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the agent terminates.
    ///
    /// # Errors
    /// * `SimError::AgentFailed` - the protocol returned an error
    /// * `SimError::AgentPanicked` - the protocol panicked
    pub fn join(self) -> Result<AgentReport, SimError> {
        match self.thread.join() {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(source)) => Err(SimError::AgentFailed { agent: self.id, source }),
            Err(payload) => {
                self.state.set(AgentState::Failed);
                Err(SimError::AgentPanicked {
                    agent: self.id,
                    message: panic_message(payload.as_ref()),
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Everything a running protocol can reach.
pub struct AgentContext<M, R> {
    id: AgentId,
    holder: Holder,
    arena: Arc<QuantumArena>,
    sink: ResultsSink<R>,
    clock: LogicalClock,
    pulse_length: f64,
    rng: ChaCha8Rng,
    quantum_out: HashMap<AgentId, ChannelTx<ParticleRef>>,
    quantum_in: HashMap<AgentId, ChannelRx<ParticleRef>>,
    classical_out: HashMap<AgentId, ChannelTx<M>>,
    classical_in: HashMap<AgentId, ChannelRx<M>>,
    /// Received or stored particles, keyed by the peer they came from
    quantum_memory: HashMap<AgentId, VecDeque<ParticleRef>>,
    classical_memory: HashMap<AgentId, VecDeque<M>>,
    progress: Arc<Progress>,
}

fn outbound<'a, T>(
    map: &'a mut HashMap<AgentId, ChannelTx<T>>,
    peer: &str,
    kind: ChannelKind,
) -> Result<&'a mut ChannelTx<T>, ChannelError> {
    map.get_mut(peer).ok_or_else(|| ChannelError::UnknownPeer {
        peer: AgentId::from(peer),
        kind: kind.as_str(),
    })
}

fn inbound<'a, T>(
    map: &'a mut HashMap<AgentId, ChannelRx<T>>,
    peer: &str,
    kind: ChannelKind,
) -> Result<&'a mut ChannelRx<T>, ChannelError> {
    map.get_mut(peer).ok_or_else(|| ChannelError::UnknownPeer {
        peer: AgentId::from(peer),
        kind: kind.as_str(),
    })
}

impl<M: Transmit, R: Send + 'static> AgentContext<M, R> {
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn holder(&self) -> Holder {
        self.holder
    }

    /// Current logical time in seconds.
    pub fn time(&self) -> f64 {
        self.clock.now()
    }

    pub fn pulse_length(&self) -> f64 {
        self.pulse_length
    }

    pub fn arena(&self) -> &Arc<QuantumArena> {
        &self.arena
    }

    /// This agent's RNG, derived from the simulation seed.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Views system `index` as this agent.
    pub fn system(&self, index: usize) -> Result<SystemView, ArenaError> {
        self.arena.view_as(index, self.holder)
    }

    /// Streams every system of the arena, in order, advancing progress.
    pub fn stream(&self) -> SystemStream {
        SystemStream::new(Arc::clone(&self.arena), self.holder, Arc::clone(&self.progress))
    }

    /// Measures a particle with this agent's RNG.
    pub fn measure(&mut self, particle: ParticleRef) -> Result<u8, ArenaError> {
        particle.measure(&mut self.rng)
    }

    /// Sends a particle to `peer`.
    pub fn qsend(&mut self, peer: &str, particle: ParticleRef) -> Result<(), ChannelError> {
        outbound(&mut self.quantum_out, peer, ChannelKind::Quantum)?.send(
            particle,
            &mut self.clock,
            self.pulse_length,
            self.holder,
        )
    }

    /// Receives the next particle from `peer`; `None` if it was lost.
    pub fn qrecv(&mut self, peer: &str) -> Result<Option<ParticleRef>, ChannelError> {
        inbound(&mut self.quantum_in, peer, ChannelKind::Quantum)?.recv(&mut self.clock, self.holder)
    }

    /// Like [`qrecv`](Self::qrecv), giving up after `timeout` of wall time.
    pub fn qrecv_timeout(&mut self, peer: &str, timeout: Duration) -> Result<Option<ParticleRef>, ChannelError> {
        inbound(&mut self.quantum_in, peer, ChannelKind::Quantum)?.recv_timeout(timeout, &mut self.clock, self.holder)
    }

    /// Sends a classical message to `peer`.
    pub fn csend(&mut self, peer: &str, message: M) -> Result<(), ChannelError> {
        outbound(&mut self.classical_out, peer, ChannelKind::Classical)?.send(
            message,
            &mut self.clock,
            self.pulse_length,
            self.holder,
        )
    }

    /// Receives the next classical message from `peer`; `None` if it was lost.
    pub fn crecv(&mut self, peer: &str) -> Result<Option<M>, ChannelError> {
        inbound(&mut self.classical_in, peer, ChannelKind::Classical)?.recv(&mut self.clock, self.holder)
    }

    /// Like [`crecv`](Self::crecv), giving up after `timeout` of wall time.
    pub fn crecv_timeout(&mut self, peer: &str, timeout: Duration) -> Result<Option<M>, ChannelError> {
        inbound(&mut self.classical_in, peer, ChannelKind::Classical)?.recv_timeout(timeout, &mut self.clock, self.holder)
    }

    /// Receives the next particle from `peer` into [`qmem`](Self::qmem).
    ///
    /// Returns false, storing nothing, if the particle was lost.
    pub fn qrecv_into_memory(&mut self, peer: &str) -> Result<bool, ChannelError> {
        match self.qrecv(peer)? {
            Some(particle) => {
                self.qmem(peer).push_back(particle);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Receives the next classical message from `peer` into [`cmem`](Self::cmem).
    pub fn crecv_into_memory(&mut self, peer: &str) -> Result<bool, ChannelError> {
        match self.crecv(peer)? {
            Some(message) => {
                self.cmem(peer).push_back(message);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Particles kept for `peer`, oldest first. This agent's own id holds
    /// what [`qstore`](Self::qstore) parked.
    pub fn qmem(&mut self, peer: &str) -> &mut VecDeque<ParticleRef> {
        self.quantum_memory.entry(AgentId::from(peer)).or_default()
    }

    /// Classical messages kept for `peer`, oldest first.
    pub fn cmem(&mut self, peer: &str) -> &mut VecDeque<M> {
        self.classical_memory.entry(AgentId::from(peer)).or_default()
    }

    /// Parks a particle in this agent's own memory.
    ///
    /// The particle is claimed first, so it stays with this agent until it
    /// is taken out and sent.
    pub fn qstore(&mut self, particle: ParticleRef) -> Result<(), ArenaError> {
        particle.claim()?;
        let id = self.id.clone();
        self.quantum_memory.entry(id).or_default().push_back(particle);
        Ok(())
    }

    /// Parks a classical value in this agent's own memory.
    pub fn cstore(&mut self, message: M) {
        let id = self.id.clone();
        self.classical_memory.entry(id).or_default().push_back(message);
    }

    /// Publishes this agent's result. Write-once.
    pub fn output(&mut self, result: R) -> Result<(), SinkError> {
        self.sink.publish(&self.id, result)?;
        debug!("result published");
        Ok(())
    }

    /// Sets the progress counter.
    pub fn update_progress(&self, current: usize) {
        self.progress.set(current);
    }

    pub fn increment_progress(&self) {
        self.progress.increment();
    }

    /// Returns the peers this agent has a channel of `kind` to, sorted.
    pub fn peers(&self, kind: ChannelKind) -> Vec<&AgentId> {
        let mut peers: Vec<_> = match kind {
            ChannelKind::Quantum => self.quantum_out.keys().collect(),
            ChannelKind::Classical => self.classical_out.keys().collect(),
        };
        peers.sort();
        peers
    }

    fn report(&self) -> AgentReport {
        let mut report = AgentReport {
            id: self.id.clone(),
            final_time: self.clock.now(),
            sent: 0,
            lost: 0,
            received: 0,
            received_lost: 0,
        };
        let sending = self
            .quantum_out
            .values()
            .map(ChannelTx::stats)
            .chain(self.classical_out.values().map(ChannelTx::stats));
        for stats in sending {
            report.sent += stats.items;
            report.lost += stats.lost;
        }
        let receiving = self
            .quantum_in
            .values()
            .map(ChannelRx::stats)
            .chain(self.classical_in.values().map(ChannelRx::stats));
        for stats in receiving {
            report.received += stats.items;
            report.received_lost += stats.lost;
        }
        report
    }
}

impl<M, R> fmt::Debug for AgentContext<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("id", &self.id)
            .field("time", &self.clock.now())
            .finish()
    }
}
