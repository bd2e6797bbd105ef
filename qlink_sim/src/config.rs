//! Harness configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it
//! overrides:
//!
//! ```json
//! { "systems": 32, "length_km": 25.0, "loss": 0.2 }
//! ```

use crate::error::HarnessError;
use qlink_core::{ChannelConfig, ConfigError, DEFAULT_PULSE_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration shared by all scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism (0 = random from time)
    pub seed: u64,

    /// Systems in the arena (teleported bits, encoded messages, ...)
    pub systems: usize,

    /// Agents in the swarm ring
    pub agents: usize,

    /// Fiber length of every link in km
    pub length_km: f64,

    /// Pulse length of every agent in seconds
    pub pulse_length: f64,

    /// Per-hop loss probability on the relay
    pub loss: f64,

    /// Items pushed through the relay
    pub relay_items: usize,

    /// Group size of the corrupted link
    pub group_size: usize,

    /// Per-position corruption probability of the corrupted link
    pub corruption_probability: f64,

    /// Link queue capacity; unbounded when absent
    pub capacity: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            systems: 10,
            agents: 4,
            length_km: 0.0,
            pulse_length: DEFAULT_PULSE_LENGTH,
            loss: 0.5,
            relay_items: 10_000,
            group_size: 4,
            corruption_probability: 1.0,
            capacity: None,
        }
    }
}

impl SimConfig {
    /// Loads a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|err| match err {
            HarnessError::Json { source, .. } => HarnessError::Json {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parses and validates a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self, HarnessError> {
        let config: SimConfig = serde_json::from_str(text).map_err(|source| HarnessError::Json {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the harness-level settings. Channel parameters are checked by
    /// the core when links are built.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.systems == 0 {
            return Err(HarnessError::setting("systems", "must be at least 1"));
        }
        if self.agents < 2 {
            return Err(HarnessError::setting("agents", "a ring needs at least 2 agents"));
        }
        qlink_env::validate_pulse_length(self.pulse_length).map_err(ConfigError::from)?;
        ConfigError::check_probability("loss", self.loss)?;
        ConfigError::check_probability("corruption_probability", self.corruption_probability)?;
        if self.group_size == 0 {
            return Err(HarnessError::setting("group_size", "must be at least 1"));
        }
        if self.relay_items == 0 {
            return Err(HarnessError::setting("relay_items", "must be at least 1"));
        }
        // Ring nodes send before they receive
        if self.capacity == Some(0) {
            return Err(HarnessError::setting("capacity", "must be at least 1"));
        }
        self.link().validate()?;
        Ok(())
    }

    /// Noise-free link configuration used by every scenario.
    pub fn link(&self) -> ChannelConfig {
        ChannelConfig { capacity: self.capacity, ..ChannelConfig::new(self.length_km) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SimConfig::from_json(r#"{ "systems": 32, "loss": 0.2 }"#).unwrap();
        assert_eq!(config.systems, 32);
        assert_eq!(config.loss, 0.2);
        assert_eq!(config.agents, SimConfig::default().agents);
        assert_eq!(config.relay_items, 10_000);
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(matches!(
            SimConfig::from_json(r#"{ "systems": 0 }"#),
            Err(HarnessError::Setting { name: "systems", .. })
        ));
        assert!(matches!(
            SimConfig::from_json(r#"{ "agents": 1 }"#),
            Err(HarnessError::Setting { name: "agents", .. })
        ));
        assert!(matches!(
            SimConfig::from_json(r#"{ "length_km": -1.0 }"#),
            Err(HarnessError::Config(_))
        ));
        assert!(matches!(
            SimConfig::from_json(r#"{ "pulse_length": 0.0 }"#),
            Err(HarnessError::Config(_))
        ));
        assert!(matches!(
            SimConfig::from_json(r#"{ "loss": 1.5 }"#),
            Err(HarnessError::Config(_))
        ));
        assert!(matches!(
            SimConfig::from_json(r#"{ "capacity": 0 }"#),
            Err(HarnessError::Setting { name: "capacity", .. })
        ));
        assert!(matches!(SimConfig::from_json("{ systems"), Err(HarnessError::Json { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimConfig::load("/nonexistent/qlink.json").unwrap_err();
        assert!(matches!(err, HarnessError::Io { .. }));
    }

    #[test]
    fn test_link_carries_settings() {
        let config = SimConfig { length_km: 12.5, capacity: Some(8), ..Default::default() };
        let link = config.link();
        assert_eq!(link.length_km, 12.5);
        assert_eq!(link.capacity, Some(8));
        assert_eq!(link.pulse_length, None);
        assert!(link.noise.is_empty());
    }
}
