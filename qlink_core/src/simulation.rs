//! Simulation driver: start every agent, join every agent, drain results.

use crate::agent::{Agent, AgentContext, AgentReport};
use crate::arena::QuantumArena;
use crate::error::{AgentError, ConfigError, SimError};
use crate::sink::{ProgressBoard, Results, ResultsSink};
use crate::transmit::Transmit;
use qlink_env::AgentId;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct SimulationReport<R> {
    /// Published results, keyed by agent id
    pub results: Results<R>,

    /// One report per agent, in the order agents were added
    pub agents: Vec<AgentReport>,

    /// Master seed of the run
    pub seed: u64,

    /// Wall-clock duration of the run in seconds
    pub wall_time_secs: f64,
}

impl<R> SimulationReport<R> {
    pub fn agent(&self, id: &str) -> Option<&AgentReport> {
        self.agents.iter().find(|report| report.id.as_str() == id)
    }

    /// Latest logical clock over all agents (seconds).
    pub fn final_time(&self) -> f64 {
        self.agents.iter().map(|report| report.final_time).fold(0.0, f64::max)
    }
}

/// One simulation run over a shared arena.
///
/// ```
/// use qlink_core::{qconnect, ChannelConfig, QuantumArena, Simulation};
///
/// let arena = QuantumArena::allocate(1, 4).unwrap();
/// let mut sim = Simulation::<u8, usize>::new(&arena, 7);
///
/// let mut alice = sim.agent("Alice", |ctx| {
///     for mut system in ctx.stream() {
///         let q = system.qubits().next().unwrap();
///         ctx.qsend("Bob", q)?;
///     }
///     Ok(())
/// });
/// let mut bob = sim.agent("Bob", |ctx| {
///     let mut received = 0;
///     for _ in 0..4 {
///         received += ctx.qrecv("Alice")?.is_some() as usize;
///     }
///     ctx.output(received)?;
///     Ok(())
/// });
/// qconnect(&mut alice, &mut bob, &ChannelConfig::new(1.0)).unwrap();
/// sim.add(alice).unwrap();
/// sim.add(bob).unwrap();
///
/// let report = sim.run().unwrap();
/// assert_eq!(report.results.get("Bob"), Some(&4));
/// ```
pub struct Simulation<M, R> {
    arena: Arc<QuantumArena>,
    sink: ResultsSink<R>,
    seed: u64,
    agents: Vec<Agent<M, R>>,
}

impl<M: Transmit, R: Send + 'static> Simulation<M, R> {
    /// Creates an empty simulation over `arena` with master seed `seed`.
    pub fn new(arena: &Arc<QuantumArena>, seed: u64) -> Self {
        Self {
            arena: Arc::clone(arena),
            sink: ResultsSink::new(),
            seed,
            agents: Vec::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn arena(&self) -> &Arc<QuantumArena> {
        &self.arena
    }

    pub(crate) fn sink(&self) -> &ResultsSink<R> {
        &self.sink
    }

    /// Builds an agent bound to this simulation's arena, sink and seed.
    /// It still has to be [`add`](Self::add)ed.
    pub fn agent<F>(&self, name: impl Into<AgentId>, protocol: F) -> Agent<M, R>
    where
        F: FnMut(&mut AgentContext<M, R>) -> Result<(), AgentError> + Send + 'static,
    {
        Agent::new(name, &self.arena, &self.sink, protocol).with_seed(self.seed)
    }

    /// Adds an agent.
    ///
    /// # Errors
    /// * `ConfigError::DuplicateAgent` - an agent with the same id was added
    /// * `ConfigError::ForeignArena` - the agent is bound to another arena
    /// * `ConfigError::ForeignSink` - the agent publishes into another sink
    pub fn add(&mut self, agent: Agent<M, R>) -> Result<(), ConfigError> {
        if self.agents.iter().any(|a| a.id() == agent.id()) {
            return Err(ConfigError::DuplicateAgent(agent.id().clone()));
        }
        if !Arc::ptr_eq(agent.arena(), &self.arena) {
            return Err(ConfigError::ForeignArena(agent.id().clone()));
        }
        if !agent.sink().same_sink(&self.sink) {
            return Err(ConfigError::ForeignSink(agent.id().clone()));
        }
        self.agents.push(agent);
        Ok(())
    }

    /// Number of agents added so far.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Progress of every agent, pollable from another thread during [`run`](Self::run).
    pub fn progress_board(&self) -> ProgressBoard {
        self.sink.progress_board()
    }

    /// Runs every agent to completion.
    ///
    /// All agents are started, then all are joined, and only then are the
    /// results read back. If any agent failed, the run fails with the
    /// root-cause agent's error: failures that are only disconnections from
    /// an agent that had already stopped are reported last.
    pub fn run(self) -> Result<SimulationReport<R>, SimError> {
        if self.agents.is_empty() {
            return Err(ConfigError::NoAgents.into());
        }

        let started = Instant::now();
        info!(agents = self.agents.len(), seed = self.seed, "starting simulation");

        let mut handles = Vec::with_capacity(self.agents.len());
        let mut failures = Vec::new();
        for agent in self.agents {
            match agent.start() {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    error!(%err, "agent did not start");
                    failures.push(err);
                }
            }
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(err) => failures.push(err),
            }
        }

        if !failures.is_empty() {
            let root = failures
                .iter()
                .position(|err| !err.is_disconnect())
                .unwrap_or(0);
            let root = failures.swap_remove(root);
            for other in &failures {
                warn!(%other, "secondary agent failure");
            }
            error!(agent = ?root.agent(), %root, "simulation failed");
            return Err(root);
        }

        let results = self.sink.drain();
        let wall_time_secs = started.elapsed().as_secs_f64();
        info!(results = results.len(), wall_time_secs, "simulation complete");

        Ok(SimulationReport {
            results,
            agents: reports,
            seed: self.seed,
            wall_time_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{cconnect, ChannelConfig};

    type Sim = Simulation<u8, u8>;

    #[test]
    fn test_empty_simulation() {
        let arena = QuantumArena::allocate(1, 1).unwrap();
        let err = Sim::new(&arena, 0).run().unwrap_err();
        assert!(matches!(err, SimError::Config(ConfigError::NoAgents)));
    }

    #[test]
    fn test_duplicate_agent() {
        let arena = QuantumArena::allocate(1, 1).unwrap();
        let mut sim = Sim::new(&arena, 0);
        sim.add(sim.agent("Alice", |_| Ok(()))).unwrap();
        let err = sim.add(sim.agent("Alice", |_| Ok(()))).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateAgent("Alice".into()));
    }

    #[test]
    fn test_foreign_arena_and_sink() {
        let arena = QuantumArena::allocate(1, 1).unwrap();
        let other = QuantumArena::allocate(1, 1).unwrap();
        let mut sim = Sim::new(&arena, 0);

        let stranger = Agent::new("Eve", &other, sim.sink(), |_| Ok(()));
        assert_eq!(sim.add(stranger).unwrap_err(), ConfigError::ForeignArena("Eve".into()));

        let foreign_sink = ResultsSink::new();
        let stranger = Agent::new("Eve", &arena, &foreign_sink, |_| Ok(()));
        assert_eq!(sim.add(stranger).unwrap_err(), ConfigError::ForeignSink("Eve".into()));
        assert!(sim.is_empty());
    }

    #[test]
    fn test_results_only_through_report() {
        let arena = QuantumArena::allocate(1, 1).unwrap();
        let mut sim = Sim::new(&arena, 0);
        let sink = sim.sink().clone();
        sim.add(sim.agent("Alice", |ctx| ctx.output(1).map_err(AgentError::from))).unwrap();
        sim.add(sim.agent("Bob", |ctx| ctx.output(2).map_err(AgentError::from))).unwrap();

        let report = sim.run().unwrap();
        assert_eq!(report.results.get("Alice"), Some(&1));
        assert_eq!(report.results.get("Bob"), Some(&2));
        // Everything moved into the report
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_root_cause_is_reported() {
        let arena = QuantumArena::allocate(1, 1).unwrap();
        let mut sim = Sim::new(&arena, 0);
        let mut alice = sim.agent("Alice", |_| Err(AgentError::protocol("bad input")));
        let mut bob = sim.agent("Bob", |ctx| {
            // Alice never sends: this wakes up with Disconnected
            ctx.crecv("Alice")?;
            Ok(())
        });
        cconnect(&mut alice, &mut bob, &ChannelConfig::default()).unwrap();
        sim.add(bob).unwrap();
        sim.add(alice).unwrap();

        let err = sim.run().unwrap_err();
        assert_eq!(err.agent().map(|a| a.as_str()), Some("Alice"));
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_deterministic_measurements() {
        fn run(seed: u64) -> u8 {
            let arena = QuantumArena::allocate(4, 1).unwrap();
            let mut sim = Sim::new(&arena, seed);
            let agent = sim.agent("Alice", |ctx| {
                let mut system = ctx.system(0)?;
                let mut bits = 0u8;
                for q in system.qubits() {
                    crate::gates::h(&q)?;
                    bits = (bits << 1) | ctx.measure(q)?;
                }
                ctx.output(bits)?;
                Ok(())
            });
            sim.add(agent).unwrap();
            sim.run().unwrap().results.get("Alice").copied().unwrap()
        }

        assert_eq!(run(9), run(9));
        let distinct: std::collections::HashSet<_> = (0..8).map(run).collect();
        assert!(distinct.len() > 1);
    }
}
