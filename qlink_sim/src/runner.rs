//! Scenario runner - executes canned protocols and checks their outcome.

use crate::config::SimConfig;
use crate::protocols::{corrupted, relay, superdense, swarm, teleport, Outcome};
use crate::scenarios::ScenarioId;

use qlink_core::AgentReport;
use serde::Serialize;
use tracing::{info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Latest logical clock over all agents (seconds)
    pub final_time_secs: f64,

    /// Wall-clock duration (seconds)
    pub wall_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,

    /// Per-agent traffic
    pub agents: Vec<AgentReport>,
}

impl ScenarioResult {
    fn from_outcome(scenario: ScenarioId, seed: u64, outcome: Outcome) -> Self {
        Self {
            scenario,
            seed,
            passed: outcome.failure.is_none(),
            final_time_secs: outcome.final_time_secs,
            wall_time_secs: outcome.wall_time_secs,
            failure_reason: outcome.failure,
            metrics: outcome.metrics,
            agents: outcome.agents,
        }
    }

    fn errored(scenario: ScenarioId, seed: u64, reason: String) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            final_time_secs: 0.0,
            wall_time_secs: 0.0,
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
            agents: Vec::new(),
        }
    }
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    /// Items sent over all channels
    pub items_sent: u64,

    /// Of those, items lost in transit
    pub items_lost: u64,

    /// Items delivered over all channels
    pub items_received: u64,

    /// Outcomes compared against the expected value
    pub checked: usize,

    /// Outcomes that did not match
    pub mismatches: usize,

    /// Observed lost fraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_fraction: Option<f64>,

    /// Lost fraction the noise model predicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_loss: Option<f64>,

    /// Measured bit flips
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flips: Option<usize>,
}

impl ScenarioMetrics {
    /// Traffic totals over every agent.
    pub fn from_agents(agents: &[AgentReport]) -> Self {
        agents.iter().fold(Self::default(), |mut metrics, agent| {
            metrics.items_sent += agent.sent;
            metrics.items_lost += agent.lost;
            metrics.items_received += agent.received;
            metrics
        })
    }
}

/// Runs canned scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Scenario parameters
    config: SimConfig,

    /// Draw per-agent progress bars
    show_progress: bool,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, config: SimConfig) -> Self {
        Self {
            seed,
            config,
            show_progress: false,
        }
    }

    /// Enables progress bars.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        info!("  {}", scenario.description());

        let (config, seed, progress) = (&self.config, self.seed, self.show_progress);
        let outcome = match scenario {
            ScenarioId::Teleportation => teleport::run(config, seed, progress),
            ScenarioId::SuperdenseCoding => superdense::run(config, seed, progress),
            ScenarioId::LossyRelay => relay::run(config, seed, progress),
            ScenarioId::Swarm => swarm::run(config, seed, progress),
            ScenarioId::CorruptedLink => corrupted::run(config, seed, progress),
        };

        match outcome {
            Ok(outcome) => ScenarioResult::from_outcome(scenario, seed, outcome),
            Err(e) => {
                warn!("Scenario {} aborted: {}", scenario.name(), e);
                ScenarioResult::errored(scenario, seed, e.to_string())
            }
        }
    }
}
