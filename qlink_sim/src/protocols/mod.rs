//! Canned protocols, one module per scenario.
//!
//! Each module exposes its agents' protocol functions (reusable in other
//! setups) and a `run` that wires them into a [`Simulation`] and checks
//! what came out.

pub mod corrupted;
pub mod relay;
pub mod superdense;
pub mod swarm;
pub mod teleport;

use crate::config::SimConfig;
use crate::error::HarnessError;
use crate::monitor::ProgressMonitor;
use crate::runner::ScenarioMetrics;
use qlink_core::{Agent, AgentContext, AgentError, AgentReport, Results, SimError, Simulation, SimulationReport, Transmit};
use qlink_env::SeedSequence;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// What a scenario run produced, independent of its message and result types.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Per-agent traffic reports
    pub agents: Vec<AgentReport>,

    /// Latest logical clock over all agents (seconds)
    pub final_time_secs: f64,

    /// Wall-clock duration (seconds)
    pub wall_time_secs: f64,

    /// Scenario-specific counters
    pub metrics: ScenarioMetrics,

    /// Why the run's outcome is wrong, if it is
    pub failure: Option<String>,
}

impl Outcome {
    pub(crate) fn new<R>(report: &SimulationReport<R>, metrics: ScenarioMetrics, failure: Option<String>) -> Self {
        Self {
            agents: report.agents.clone(),
            final_time_secs: report.final_time(),
            wall_time_secs: report.wall_time_secs,
            metrics,
            failure,
        }
    }
}

/// Builds an agent of `sim` with the configured pulse length.
pub(crate) fn agent<M, R, F>(sim: &Simulation<M, R>, config: &SimConfig, name: &str, protocol: F) -> Result<Agent<M, R>, HarnessError>
where
    M: Transmit,
    R: Send + 'static,
    F: FnMut(&mut AgentContext<M, R>) -> Result<(), AgentError> + Send + 'static,
{
    Ok(sim.agent(name, protocol).with_pulse_length(config.pulse_length)?)
}

/// Runs `sim`, drawing progress bars while it is in flight.
pub(crate) fn execute<M, R>(sim: Simulation<M, R>, label: &str, progress: bool) -> Result<SimulationReport<R>, SimError>
where
    M: Transmit,
    R: Send + 'static,
{
    let monitor = progress.then(|| ProgressMonitor::spawn(sim.progress_board(), label));
    let report = sim.run();
    if let Some(monitor) = monitor {
        monitor.finish();
    }
    report
}

/// Takes an agent's published result out of the results.
pub(crate) fn take<R>(results: &mut Results<R>, agent: &str) -> Result<R, HarnessError> {
    results.take(agent).ok_or_else(|| HarnessError::MissingResult(agent.to_string()))
}

/// Draws the scenario payload from its own stream of the master seed.
pub(crate) fn random_bits(seed: u64, label: &str, count: usize) -> Vec<u8> {
    let mut rng: ChaCha8Rng = SeedSequence::new(seed).rng(label);
    (0..count).map(|_| rng.gen_range(0..=1)).collect()
}
