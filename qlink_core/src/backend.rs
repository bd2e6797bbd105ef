//! The math collaborator behind the arena.
//!
//! The arena only stores matrices and decides who may touch them; what it
//! means to apply an operator or measure a particle is delegated to a
//! [`QuantumBackend`]. Calls are synchronous and never block on other agents.

use crate::error::ArenaError;
use crate::linalg::{self, Operator};

/// Operations on one system's state.
///
/// # Implementations
///
/// - [`DensityMatrixBackend`]: exact density-matrix evolution (default)
pub trait QuantumBackend: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Writes the all-zero state of a `num_qubits` system into `state`.
    fn reset(&self, state: &mut Operator, num_qubits: usize);

    /// Applies `operator` to the particles `targets` (in that order).
    fn apply(
        &self,
        state: &mut Operator,
        num_qubits: usize,
        targets: &[usize],
        operator: &Operator,
    ) -> Result<(), ArenaError>;

    /// Measures `qubit`, collapsing `state`.
    ///
    /// `sample` is a uniform draw in [0, 1) supplied by the caller, so the
    /// randomness stays with the agent (and its seed).
    fn measure(&self, state: &mut Operator, num_qubits: usize, qubit: usize, sample: f64) -> u8;
}

/// Exact density-matrix backend: `ρ ← U ρ U†`, projective measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct DensityMatrixBackend;

impl QuantumBackend for DensityMatrixBackend {
    fn name(&self) -> &'static str {
        "density-matrix"
    }

    fn reset(&self, state: &mut Operator, num_qubits: usize) {
        *state = linalg::zero_state(num_qubits);
    }

    fn apply(
        &self,
        state: &mut Operator,
        num_qubits: usize,
        targets: &[usize],
        operator: &Operator,
    ) -> Result<(), ArenaError> {
        let full_system = targets.len() == num_qubits && targets.iter().enumerate().all(|(i, &t)| i == t);
        if full_system && operator.nrows() == state.nrows() {
            linalg::conjugate(state, operator);
        } else {
            let unitary = linalg::expand(operator, targets, num_qubits)?;
            linalg::conjugate(state, &unitary);
        }
        Ok(())
    }

    fn measure(&self, state: &mut Operator, num_qubits: usize, qubit: usize, sample: f64) -> u8 {
        linalg::measure(state, num_qubits, qubit, sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates;

    #[test]
    fn test_apply_and_measure() {
        let backend = DensityMatrixBackend;
        let mut state = linalg::zero_state(2);

        backend.apply(&mut state, 2, &[1], &gates::pauli_x()).unwrap();
        assert_eq!(backend.measure(&mut state, 2, 0, 0.5), 0);
        assert_eq!(backend.measure(&mut state, 2, 1, 0.5), 1);

        backend.reset(&mut state, 2);
        assert_eq!(state, linalg::zero_state(2));
    }

    #[test]
    fn test_full_system_operator() {
        let backend = DensityMatrixBackend;
        let mut state = linalg::zero_state(2);
        backend.apply(&mut state, 2, &[0], &gates::pauli_x()).unwrap();
        backend.apply(&mut state, 2, &[0, 1], &gates::cnot()).unwrap();

        // |10⟩ -> |11⟩
        assert!((state[(3, 3)].re - 1.0).abs() < 1e-12);
    }
}
