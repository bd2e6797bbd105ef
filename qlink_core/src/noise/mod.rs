//! Error pipeline for channels.
//!
//! Every item sent over a channel passes through the sending endpoint's
//! [`ErrorPipeline`]: an ordered list of [`ErrorModel`]s, each one an explicit
//! state machine owned by that single channel direction. Models thread an
//! `Option<T>` through; `None` means the item was lost and reaches the
//! receiving protocol as `None`.
//!
//! # Models
//!
//! | Model                  | Items        | State                      |
//! |------------------------|--------------|----------------------------|
//! | [`Attenuation`]        | any          | none                       |
//! | [`PositionalCorruption`] | particles  | position counter + armed flag |
//! | [`RandomUnitary`]      | particles    | none                       |
//! | [`SystematicUnitary`]  | particles    | fixed operator             |

mod attenuation;
mod corruption;
mod unitary;

pub use attenuation::{Attenuation, FIBER_ATTENUATION_DB_PER_KM};
pub use corruption::PositionalCorruption;
pub use unitary::{RandomUnitary, SystematicUnitary};

use crate::error::ConfigError;
use crate::system::ParticleRef;
use crate::transmit::Transmit;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stateful transform applied to every item sent over a channel.
pub trait ErrorModel<T>: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Transforms one item. `None` in means the item was already lost.
    fn apply(&mut self, item: Option<T>, rng: &mut dyn RngCore) -> Option<T>;

    /// Returns the model to its initial state.
    fn reset(&mut self) {}
}

/// Ordered list of error models owned by one channel direction.
pub struct ErrorPipeline<T> {
    models: Vec<Box<dyn ErrorModel<T>>>,
}

impl<T> ErrorPipeline<T> {
    /// Creates an empty (lossless, noiseless) pipeline.
    pub fn new() -> Self {
        Self { models: Vec::new() }
    }

    /// Appends a model; models run in registration order.
    pub fn register<E: ErrorModel<T> + 'static>(&mut self, model: E) -> &mut Self {
        self.models.push(Box::new(model));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<E: ErrorModel<T> + 'static>(mut self, model: E) -> Self {
        self.models.push(Box::new(model));
        self
    }

    /// Runs `item` through every model in order.
    pub fn process(&mut self, mut item: Option<T>, rng: &mut dyn RngCore) -> Option<T> {
        for model in &mut self.models {
            item = model.apply(item, rng);
        }
        item
    }

    /// Resets every model.
    pub fn reset(&mut self) {
        for model in &mut self.models {
            model.reset();
        }
    }

    /// Returns the model names, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.models.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl<T> Default for ErrorPipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ErrorPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<T: Transmit> ErrorPipeline<T> {
    /// Builds a pipeline for a classical channel.
    ///
    /// # Errors
    /// `ConfigError::QuantumOnlyNoise` if a spec only applies to particles.
    pub fn classical(specs: &[NoiseSpec], length_km: f64) -> Result<Self, ConfigError> {
        let mut pipeline = Self::new();
        pipeline.extend_classical(specs, length_km)?;
        Ok(pipeline)
    }

    /// Appends classical models built from `specs`.
    pub fn extend_classical(&mut self, specs: &[NoiseSpec], length_km: f64) -> Result<(), ConfigError> {
        for spec in specs {
            match spec {
                NoiseSpec::Attenuation { .. } | NoiseSpec::Loss { .. } => {
                    self.register(spec.attenuation(length_km)?);
                }
                other => return Err(ConfigError::QuantumOnlyNoise(other.name())),
            }
        }
        Ok(())
    }
}

impl ErrorPipeline<ParticleRef> {
    /// Builds a pipeline for a quantum channel.
    ///
    /// `rng` is only used by models that draw their parameters once at
    /// construction (`SystematicUnitary` with a Gaussian rotation).
    pub fn quantum(specs: &[NoiseSpec], length_km: f64, rng: &mut dyn RngCore) -> Result<Self, ConfigError> {
        let mut pipeline = Self::new();
        pipeline.extend_quantum(specs, length_km, rng)?;
        Ok(pipeline)
    }

    /// Appends quantum models built from `specs`.
    pub fn extend_quantum(
        &mut self,
        specs: &[NoiseSpec],
        length_km: f64,
        rng: &mut dyn RngCore,
    ) -> Result<(), ConfigError> {
        for spec in specs {
            match *spec {
                NoiseSpec::Attenuation { .. } | NoiseSpec::Loss { .. } => {
                    self.register(spec.attenuation(length_km)?);
                }
                NoiseSpec::PositionalCorruption { group_size, probability } => {
                    self.register(PositionalCorruption::new(group_size, probability)?);
                }
                NoiseSpec::RandomUnitary { std_dev } => {
                    self.register(RandomUnitary::new(std_dev)?);
                }
                NoiseSpec::SystematicUnitary { std_dev } => {
                    self.register(SystematicUnitary::gaussian(std_dev, rng)?);
                }
            }
        }
        Ok(())
    }
}

/// Serializable description of an error model.
///
/// ```
/// use qlink_core::noise::NoiseSpec;
///
/// let specs: Vec<NoiseSpec> = serde_json::from_str(
///     r#"[{"model": "attenuation"}, {"model": "loss", "probability": 0.5}]"#,
/// ).unwrap();
/// assert_eq!(specs[1], NoiseSpec::Loss { probability: 0.5 });
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum NoiseSpec {
    /// Length-dependent fiber loss
    Attenuation {
        #[serde(default = "default_coefficient")]
        coefficient_db_per_km: f64,
    },
    /// Fixed loss probability per item
    Loss { probability: f64 },
    /// At most one random unitary per group of `group_size` particles
    PositionalCorruption { group_size: usize, probability: f64 },
    /// Gaussian X/Z rotation on every particle
    RandomUnitary { std_dev: f64 },
    /// One Gaussian rotation, drawn once, applied to every particle
    SystematicUnitary { std_dev: f64 },
}

fn default_coefficient() -> f64 {
    FIBER_ATTENUATION_DB_PER_KM
}

impl NoiseSpec {
    /// Fiber attenuation with the default coefficient.
    pub fn fiber() -> Self {
        Self::Attenuation { coefficient_db_per_km: FIBER_ATTENUATION_DB_PER_KM }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Attenuation { .. } => "attenuation",
            Self::Loss { .. } => "loss",
            Self::PositionalCorruption { .. } => "positional_corruption",
            Self::RandomUnitary { .. } => "random_unitary",
            Self::SystematicUnitary { .. } => "systematic_unitary",
        }
    }

    /// Returns true if the model only applies to particles.
    pub fn is_quantum_only(&self) -> bool {
        !matches!(self, Self::Attenuation { .. } | Self::Loss { .. })
    }

    /// Checks parameters without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Attenuation { coefficient_db_per_km } => {
                Attenuation::new(0.0, coefficient_db_per_km).map(drop)
            }
            Self::Loss { probability } => Attenuation::with_loss_probability(probability).map(drop),
            Self::PositionalCorruption { group_size, probability } => {
                PositionalCorruption::new(group_size, probability).map(drop)
            }
            Self::RandomUnitary { std_dev } | Self::SystematicUnitary { std_dev } => {
                RandomUnitary::new(std_dev).map(drop)
            }
        }
    }

    fn attenuation(&self, length_km: f64) -> Result<Attenuation, ConfigError> {
        match *self {
            Self::Attenuation { coefficient_db_per_km } => Attenuation::new(length_km, coefficient_db_per_km),
            Self::Loss { probability } => Attenuation::with_loss_probability(probability),
            _ => Err(ConfigError::parameter("noise", format!("{} is not an attenuation model", self.name()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Doubles every item.
    struct Double;

    impl ErrorModel<u32> for Double {
        fn name(&self) -> &'static str {
            "double"
        }

        fn apply(&mut self, item: Option<u32>, _rng: &mut dyn RngCore) -> Option<u32> {
            item.map(|v| v * 2)
        }
    }

    /// Drops every other item.
    struct DropOdd {
        count: u32,
    }

    impl ErrorModel<u32> for DropOdd {
        fn name(&self) -> &'static str {
            "drop_odd"
        }

        fn apply(&mut self, item: Option<u32>, _rng: &mut dyn RngCore) -> Option<u32> {
            self.count += 1;
            if self.count % 2 == 0 {
                None
            } else {
                item
            }
        }

        fn reset(&mut self) {
            self.count = 0;
        }
    }

    #[test]
    fn test_models_run_in_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut pipeline = ErrorPipeline::new().with(DropOdd { count: 0 }).with(Double);
        assert_eq!(pipeline.names(), vec!["drop_odd", "double"]);

        let out: Vec<_> = (1..=4).map(|v| pipeline.process(Some(v), &mut rng)).collect();
        assert_eq!(out, vec![Some(2), None, Some(6), None]);

        pipeline.reset();
        assert_eq!(pipeline.process(Some(5), &mut rng), Some(10));
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut pipeline = ErrorPipeline::<u8>::default();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.process(Some(9), &mut rng), Some(9));
        assert_eq!(pipeline.process(None, &mut rng), None);
    }

    #[test]
    fn test_classical_rejects_quantum_only() {
        let specs = [NoiseSpec::Loss { probability: 0.1 }, NoiseSpec::RandomUnitary { std_dev: 0.1 }];
        let err = ErrorPipeline::<u8>::classical(&specs, 1.0).unwrap_err();
        assert_eq!(err, ConfigError::QuantumOnlyNoise("random_unitary"));

        let ok = ErrorPipeline::<u8>::classical(&specs[..1], 1.0).unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn test_quantum_pipeline_from_specs() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let specs = [
            NoiseSpec::fiber(),
            NoiseSpec::PositionalCorruption { group_size: 4, probability: 0.5 },
            NoiseSpec::SystematicUnitary { std_dev: 0.2 },
        ];
        let pipeline = ErrorPipeline::quantum(&specs, 10.0, &mut rng).unwrap();
        assert_eq!(pipeline.names(), vec!["attenuation", "positional_corruption", "systematic_unitary"]);
    }

    #[test]
    fn test_spec_validation() {
        assert!(NoiseSpec::Loss { probability: 1.5 }.validate().is_err());
        assert!(NoiseSpec::PositionalCorruption { group_size: 0, probability: 0.5 }.validate().is_err());
        assert!(NoiseSpec::RandomUnitary { std_dev: -1.0 }.validate().is_err());
        assert!(NoiseSpec::fiber().validate().is_ok());
    }

    #[test]
    fn test_spec_serde() {
        let spec: NoiseSpec = serde_json::from_str(r#"{"model": "attenuation"}"#).unwrap();
        assert_eq!(spec, NoiseSpec::fiber());

        let json = serde_json::to_string(&NoiseSpec::PositionalCorruption { group_size: 8, probability: 0.25 }).unwrap();
        assert!(json.contains("positional_corruption"));
    }
}
