//! Positional corruption: at most one corrupted particle per group.

use super::ErrorModel;
use crate::error::ConfigError;
use crate::gates;
use crate::system::ParticleRef;
use rand::{Rng, RngCore};

/// Corrupts at most one particle in every group of `group_size` consecutive
/// items.
///
/// A counter runs modulo `group_size` over every item, lost ones included.
/// The model is armed at the start of each group; while armed, each particle
/// is hit by a random single-particle unitary with probability `probability`.
/// After one hit the model stays spent until the counter wraps.
#[derive(Debug, Clone)]
pub struct PositionalCorruption {
    group_size: usize,
    probability: f64,
    /// Position of the next item within its group
    position: usize,
    armed: bool,
    corrupted: u64,
}

impl PositionalCorruption {
    pub fn new(group_size: usize, probability: f64) -> Result<Self, ConfigError> {
        if group_size == 0 {
            return Err(ConfigError::parameter("group_size", "must be at least 1"));
        }
        let probability = ConfigError::check_probability("corruption", probability)?;
        Ok(Self {
            group_size,
            probability,
            position: 0,
            armed: true,
            corrupted: 0,
        })
    }

    /// Position of the next item within its group.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns true while the current group has not been corrupted yet.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Number of particles corrupted so far.
    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }
}

impl ErrorModel<ParticleRef> for PositionalCorruption {
    fn name(&self) -> &'static str {
        "positional_corruption"
    }

    fn apply(&mut self, item: Option<ParticleRef>, rng: &mut dyn RngCore) -> Option<ParticleRef> {
        if self.position == 0 {
            self.armed = true;
        }
        self.position = (self.position + 1) % self.group_size;

        let particle = item?;
        if self.armed && rng.gen::<f64>() < self.probability {
            let unitary = gates::random_unitary(rng);
            match particle.apply(&unitary) {
                Ok(()) => {
                    self.armed = false;
                    self.corrupted += 1;
                    tracing::trace!(address = ?particle.address(), "particle corrupted");
                }
                Err(err) => tracing::warn!(%err, "could not corrupt particle"),
            }
        }
        Some(particle)
    }

    fn reset(&mut self) {
        self.position = 0;
        self.armed = true;
        self.corrupted = 0;
    }
}
