//! Canned network scenarios.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// QL-001: Teleport one prepared bit per system from Alice to Bob
    Teleportation,

    /// QL-002: Two classical bits per transmitted particle
    SuperdenseCoding,

    /// QL-003: Classical relay A -> B -> C with loss on both hops
    LossyRelay,

    /// QL-004: Ring of agents passing particles around one shared arena
    Swarm,

    /// QL-005: Quantum link with positional corruption
    CorruptedLink,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Teleportation,
            ScenarioId::SuperdenseCoding,
            ScenarioId::LossyRelay,
            ScenarioId::Swarm,
            ScenarioId::CorruptedLink,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Teleportation => "teleportation",
            ScenarioId::SuperdenseCoding => "superdense_coding",
            ScenarioId::LossyRelay => "lossy_relay",
            ScenarioId::Swarm => "swarm",
            ScenarioId::CorruptedLink => "corrupted_link",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Teleportation => "Bob recovers every bit Alice teleports, in order",
            ScenarioId::SuperdenseCoding => "Bob decodes two bits from every particle pair",
            ScenarioId::LossyRelay => "Loss compounds over two hops to 1 - (1 - p)^2",
            ScenarioId::Swarm => "Every ring member receives its neighbour's particles",
            ScenarioId::CorruptedLink => "At most one corrupted particle per group",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "teleportation" | "teleport" | "ql-001" => Ok(ScenarioId::Teleportation),
            "superdense_coding" | "superdense" | "ql-002" => Ok(ScenarioId::SuperdenseCoding),
            "lossy_relay" | "relay" | "ql-003" => Ok(ScenarioId::LossyRelay),
            "swarm" | "ring" | "ql-004" => Ok(ScenarioId::Swarm),
            "corrupted_link" | "corruption" | "ql-005" => Ok(ScenarioId::CorruptedLink),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("QL-003".parse::<ScenarioId>(), Ok(ScenarioId::LossyRelay));
        assert_eq!("Teleport".parse::<ScenarioId>(), Ok(ScenarioId::Teleportation));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }
}
