//! qlink Scenario Harness
//!
//! Canned quantum network protocols run on top of `qlink_core`, each with a
//! pass/fail check, plus the pieces the `qlink-sim` CLI is built from.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                      │
//! │                                                          │
//! │  SimConfig ──▶ protocols::{teleport, superdense, relay,  │
//! │                           swarm, corrupted}::run         │
//! │                   │                                      │
//! │            ┌──────▼───────┐  board  ┌─────────────────┐  │
//! │            │  Simulation  │────────▶│ ProgressMonitor │  │
//! │            │ (qlink_core) │         │   (indicatif)   │  │
//! │            └──────┬───────┘         └─────────────────┘  │
//! │                   ▼                                      │
//! │            ScenarioResult ──▶ RunExport (JSON)           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use qlink_sim::{ScenarioRunner, SimConfig};
//! use qlink_sim::scenarios::ScenarioId;
//!
//! let runner = ScenarioRunner::new(42, SimConfig::default());
//! let result = runner.run(ScenarioId::Teleportation);
//! assert!(result.passed);
//! ```

mod config;
mod error;
mod exporter;
mod monitor;
mod runner;
pub mod protocols;
pub mod scenarios;

pub use config::SimConfig;
pub use error::HarnessError;
pub use exporter::RunExport;
pub use monitor::ProgressMonitor;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
