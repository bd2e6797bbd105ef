//! JSON export of a batch of scenario runs.

use crate::config::SimConfig;
use crate::runner::ScenarioResult;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use uuid::Uuid;

/// Every result of one CLI invocation, with the settings that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct RunExport {
    /// Unique id of this invocation
    pub run_id: String,

    /// Harness version
    pub version: String,

    /// First seed of the batch
    pub base_seed: u64,

    /// Effective configuration
    pub config: SimConfig,

    /// Runs, in execution order
    pub results: Vec<ScenarioResult>,

    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunExport {
    /// Creates a new export container.
    pub fn new(base_seed: u64, config: SimConfig) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            base_seed,
            config,
            results: Vec::new(),
            total: 0,
            passed: 0,
            failed: 0,
        }
    }

    /// Adds a result and updates the totals.
    pub fn add_result(&mut self, result: ScenarioResult) {
        self.total += 1;
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Failed runs, in execution order.
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScenarioRunner;
    use crate::scenarios::ScenarioId;

    #[test]
    fn test_totals() {
        let config = SimConfig { systems: 4, ..Default::default() };
        let runner = ScenarioRunner::new(7, config.clone());
        let mut export = RunExport::new(7, config.clone());
        export.add_result(runner.run(ScenarioId::Teleportation));
        export.add_result(ScenarioRunner::new(7, SimConfig { agents: 11, ..config }).run(ScenarioId::Swarm));

        assert_eq!((export.total, export.passed, export.failed), (2, 1, 1));
        assert_eq!(export.failures().count(), 1);
        assert!(Uuid::parse_str(&export.run_id).is_ok());
    }

    #[test]
    fn test_write_to_file() {
        let mut export = RunExport::new(1, SimConfig::default());
        export.add_result(ScenarioRunner::new(1, SimConfig { systems: 2, ..Default::default() }).run(ScenarioId::CorruptedLink));

        let path = std::env::temp_dir().join(format!("qlink-export-{}.json", export.run_id));
        let path = path.to_string_lossy().to_string();
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["run_id"], export.run_id.as_str());
        assert_eq!(json["results"][0]["scenario"], "corrupted_link");
        assert_eq!(json["config"]["systems"], 10);
        std::fs::remove_file(&path).unwrap();
    }
}
