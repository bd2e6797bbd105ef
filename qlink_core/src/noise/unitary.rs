//! Unitary noise: random and systematic rotations.

use super::ErrorModel;
use crate::error::ConfigError;
use crate::gates;
use crate::linalg::{is_unitary, Operator};
use crate::system::ParticleRef;
use rand::RngCore;
use rand_distr::{Distribution, Normal};

fn gaussian(std_dev: f64) -> Result<Normal<f64>, ConfigError> {
    if !std_dev.is_finite() || std_dev < 0.0 {
        return Err(ConfigError::parameter(
            "std_dev",
            format!("must be finite and non-negative, got {std_dev}"),
        ));
    }
    Normal::new(0.0, std_dev).map_err(|err| ConfigError::parameter("std_dev", err.to_string()))
}

fn apply_to(particle: &ParticleRef, operator: &Operator, model: &'static str) {
    if let Err(err) = particle.apply(operator) {
        tracing::warn!(model, %err, "could not apply noise");
    }
}

/// Rotates every particle about X then Z by fresh Gaussian angles.
#[derive(Debug, Clone)]
pub struct RandomUnitary {
    angle: Normal<f64>,
}

impl RandomUnitary {
    pub fn new(std_dev: f64) -> Result<Self, ConfigError> {
        Ok(Self { angle: gaussian(std_dev)? })
    }

    /// Draws the operator for one particle: `Rz(θz)·Rx(θx)`.
    pub fn draw(&self, rng: &mut dyn RngCore) -> Operator {
        let x = self.angle.sample(rng);
        let z = self.angle.sample(rng);
        gates::rz(z) * gates::rx(x)
    }
}

impl ErrorModel<ParticleRef> for RandomUnitary {
    fn name(&self) -> &'static str {
        "random_unitary"
    }

    fn apply(&mut self, item: Option<ParticleRef>, rng: &mut dyn RngCore) -> Option<ParticleRef> {
        let particle = item?;
        apply_to(&particle, &self.draw(rng), "random_unitary");
        Some(particle)
    }
}

/// Applies the same single-particle operator to every particle.
#[derive(Debug, Clone)]
pub struct SystematicUnitary {
    operator: Operator,
}

impl SystematicUnitary {
    /// Uses a fixed 2×2 unitary.
    pub fn new(operator: Operator) -> Result<Self, ConfigError> {
        if operator.nrows() != 2 || operator.ncols() != 2 || !is_unitary(&operator, 1e-9) {
            return Err(ConfigError::parameter("operator", "must be a 2x2 unitary"));
        }
        Ok(Self { operator })
    }

    /// Draws one Gaussian X/Z rotation now and applies it to every particle.
    pub fn gaussian(std_dev: f64, rng: &mut dyn RngCore) -> Result<Self, ConfigError> {
        let operator = RandomUnitary::new(std_dev)?.draw(rng);
        Ok(Self { operator })
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }
}

impl ErrorModel<ParticleRef> for SystematicUnitary {
    fn name(&self) -> &'static str {
        "systematic_unitary"
    }

    fn apply(&mut self, item: Option<ParticleRef>, _rng: &mut dyn RngCore) -> Option<ParticleRef> {
        let particle = item?;
        apply_to(&particle, &self.operator, "systematic_unitary");
        Some(particle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::QuantumArena;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_zero_std_dev_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let model = RandomUnitary::new(0.0).unwrap();
        let op = model.draw(&mut rng);
        assert!((op - gates::identity()).iter().all(|c| c.norm() < 1e-12));
    }

    #[test]
    fn test_random_draws_are_unitary() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let model = RandomUnitary::new(0.7).unwrap();
        for _ in 0..10 {
            assert!(is_unitary(&model.draw(&mut rng), 1e-10));
        }
    }

    #[test]
    fn test_systematic_flip() {
        let arena = QuantumArena::allocate(1, 3).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut model = SystematicUnitary::new(gates::pauli_x()).unwrap();

        for i in 0..3 {
            let p = arena.view_system(i).unwrap().qubit(0).unwrap();
            assert!(model.apply(Some(p), &mut rng).is_some());
            assert_relative_eq!(arena.probability_of_zero(i, 0).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(RandomUnitary::new(-0.1).is_err());
        assert!(RandomUnitary::new(f64::INFINITY).is_err());
        assert!(SystematicUnitary::new(gates::cnot()).is_err());
        assert!(SystematicUnitary::new(Operator::zeros(2, 2)).is_err());
    }
}
