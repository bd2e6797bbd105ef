//! Transmission loss.

use super::ErrorModel;
use crate::error::ConfigError;
use crate::transmit::Transmit;
use qlink_env::validate_length;
use rand::{Rng, RngCore};

/// Typical loss of telecom fiber, in dB per km.
pub const FIBER_ATTENUATION_DB_PER_KM: f64 = -0.16;

/// Loses each item independently.
///
/// The survival probability is either derived from the channel length,
/// `10^(length_km × coefficient / 10)`, or given directly as `1 - p`.
/// A lost particle collapses and is marked lost in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Attenuation {
    survival: f64,
}

impl Attenuation {
    /// Length-dependent attenuation; `coefficient_db_per_km` must be ≤ 0.
    pub fn new(length_km: f64, coefficient_db_per_km: f64) -> Result<Self, ConfigError> {
        let length_km = validate_length(length_km)?;
        if !coefficient_db_per_km.is_finite() || coefficient_db_per_km > 0.0 {
            return Err(ConfigError::parameter(
                "coefficient_db_per_km",
                format!("must be finite and non-positive, got {coefficient_db_per_km}"),
            ));
        }
        Ok(Self {
            survival: 10f64.powf(length_km * coefficient_db_per_km / 10.0),
        })
    }

    /// Fiber attenuation over `length_km`.
    pub fn fiber(length_km: f64) -> Result<Self, ConfigError> {
        Self::new(length_km, FIBER_ATTENUATION_DB_PER_KM)
    }

    /// Loses each item with probability `probability`.
    pub fn with_loss_probability(probability: f64) -> Result<Self, ConfigError> {
        let probability = ConfigError::check_probability("loss", probability)?;
        Ok(Self { survival: 1.0 - probability })
    }

    /// Probability that an item gets through.
    pub fn survival_probability(&self) -> f64 {
        self.survival
    }
}

impl<T: Transmit> ErrorModel<T> for Attenuation {
    fn name(&self) -> &'static str {
        "attenuation"
    }

    fn apply(&mut self, item: Option<T>, rng: &mut dyn RngCore) -> Option<T> {
        let item = item?;
        if rng.gen::<f64>() >= self.survival {
            tracing::trace!(survival = self.survival, "item lost");
            item.lose(rng);
            None
        } else {
            Some(item)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_survival_from_length() {
        assert_relative_eq!(Attenuation::fiber(0.0).unwrap().survival_probability(), 1.0);
        // 50 km at -0.16 dB/km is -8 dB
        assert_relative_eq!(
            Attenuation::fiber(50.0).unwrap().survival_probability(),
            10f64.powf(-0.8),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(Attenuation::new(-1.0, -0.16).is_err());
        assert!(Attenuation::new(1.0, 0.5).is_err());
        assert!(Attenuation::with_loss_probability(-0.1).is_err());
        assert!(Attenuation::with_loss_probability(f64::NAN).is_err());
    }

    #[test]
    fn test_certain_loss() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut model = Attenuation::with_loss_probability(1.0).unwrap();
        for v in 0..100u8 {
            assert_eq!(model.apply(Some(v), &mut rng), None);
        }
    }

    #[test]
    fn test_no_loss() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut model = Attenuation::with_loss_probability(0.0).unwrap();
        for v in 0..100u8 {
            assert_eq!(model.apply(Some(v), &mut rng), Some(v));
        }
        assert_eq!(ErrorModel::<u8>::apply(&mut model, None, &mut rng), None);
    }

    #[test]
    fn test_loss_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut model = Attenuation::with_loss_probability(0.3).unwrap();
        let lost = (0..10_000u32)
            .filter(|&v| model.apply(Some(v), &mut rng).is_none())
            .count();
        assert!((2_800..3_200).contains(&lost), "lost {lost}");
    }
}
