//! Density-matrix linear algebra.
//!
//! Particle 0 is the most significant bit of a basis index, i.e. an n-particle
//! state is laid out as `q0 ⊗ q1 ⊗ … ⊗ q(n-1)`.

use crate::error::ArenaError;
use nalgebra::{Complex, DMatrix};

/// A complex square matrix: operators and density matrices alike.
pub type Operator = DMatrix<Complex<f64>>;

/// Probabilities closer than this to 0 or 1 are snapped, so that a
/// deterministic outcome stays deterministic despite rounding.
const PROBABILITY_EPSILON: f64 = 1e-12;

/// Returns `|0…0⟩⟨0…0|` for `num_qubits` particles.
pub fn zero_state(num_qubits: usize) -> Operator {
    let dim = 1usize << num_qubits;
    let mut state = Operator::zeros(dim, dim);
    state[(0, 0)] = Complex::new(1.0, 0.0);
    state
}

/// Kronecker product of a list of operators (an empty list gives the 1x1 identity).
pub fn tensor(operators: &[Operator]) -> Operator {
    operators
        .iter()
        .fold(Operator::identity(1, 1), |acc, op| acc.kronecker(op))
}

#[inline]
fn bit(index: usize, num_qubits: usize, qubit: usize) -> usize {
    (index >> (num_qubits - 1 - qubit)) & 1
}

/// Embeds a k-particle operator acting on `targets` (in that order) into the
/// full `num_qubits`-particle space, identity elsewhere.
pub fn expand(operator: &Operator, targets: &[usize], num_qubits: usize) -> Result<Operator, ArenaError> {
    let expected = 1usize << targets.len();
    if operator.nrows() != expected || operator.ncols() != expected {
        return Err(ArenaError::OperatorShape {
            rows: operator.nrows(),
            cols: operator.ncols(),
            expected,
        });
    }
    for (i, &target) in targets.iter().enumerate() {
        if target >= num_qubits {
            return Err(ArenaError::ParticleOutOfRange { index: target, count: num_qubits });
        }
        if targets[..i].contains(&target) {
            return Err(ArenaError::RepeatedParticle(target));
        }
    }

    let dim = 1usize << num_qubits;
    let mask = targets
        .iter()
        .fold(0usize, |acc, &t| acc | (1 << (num_qubits - 1 - t)));
    let sub_index = |x: usize| {
        targets
            .iter()
            .fold(0usize, |acc, &t| (acc << 1) | bit(x, num_qubits, t))
    };

    let mut full = Operator::zeros(dim, dim);
    for row in 0..dim {
        for col in 0..dim {
            // Untouched particles must agree between row and column
            if row & !mask != col & !mask {
                continue;
            }
            full[(row, col)] = operator[(sub_index(row), sub_index(col))];
        }
    }
    Ok(full)
}

/// Evolves a density matrix in place: `ρ ← U ρ U†`.
pub fn conjugate(state: &mut Operator, unitary: &Operator) {
    let evolved = unitary * &*state * unitary.adjoint();
    *state = evolved;
}

/// Probability of observing 0 on `qubit`.
pub fn probability_of_zero(state: &Operator, num_qubits: usize, qubit: usize) -> f64 {
    let p: f64 = (0..state.nrows())
        .filter(|&i| bit(i, num_qubits, qubit) == 0)
        .map(|i| state[(i, i)].re)
        .sum();
    if p < PROBABILITY_EPSILON {
        0.0
    } else if p > 1.0 - PROBABILITY_EPSILON {
        1.0
    } else {
        p
    }
}

/// Projectively measures `qubit` in the computational basis.
///
/// `sample` is a uniform draw from [0, 1); the outcome is 0 when
/// `sample < P(0)`. The state collapses in place and is renormalized.
pub fn measure(state: &mut Operator, num_qubits: usize, qubit: usize, sample: f64) -> u8 {
    let prob0 = probability_of_zero(state, num_qubits, qubit);
    let outcome = if sample < prob0 { 0 } else { 1 };
    let norm = if outcome == 0 { prob0 } else { 1.0 - prob0 };

    let dim = state.nrows();
    for row in 0..dim {
        for col in 0..dim {
            if bit(row, num_qubits, qubit) != outcome || bit(col, num_qubits, qubit) != outcome {
                state[(row, col)] = Complex::new(0.0, 0.0);
            } else {
                state[(row, col)] /= Complex::new(norm, 0.0);
            }
        }
    }
    outcome as u8
}

/// Checks `U U† = I` within `epsilon`.
pub fn is_unitary(operator: &Operator, epsilon: f64) -> bool {
    if !operator.is_square() {
        return false;
    }
    let product = operator * operator.adjoint();
    let identity = Operator::identity(operator.nrows(), operator.ncols());
    (product - identity).iter().all(|c| c.norm() < epsilon)
}

/// Checks `A = A†` within `epsilon`.
pub fn is_hermitian(operator: &Operator, epsilon: f64) -> bool {
    operator.is_square() && (operator - operator.adjoint()).iter().all(|c| c.norm() < epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_state() {
        let state = zero_state(2);
        assert_eq!(state.nrows(), 4);
        assert_relative_eq!(state.trace().re, 1.0);
        assert_relative_eq!(probability_of_zero(&state, 2, 0), 1.0);
        assert_relative_eq!(probability_of_zero(&state, 2, 1), 1.0);
    }

    #[test]
    fn test_expand_matches_kronecker() {
        let x = gates::pauli_x();
        let id = gates::identity();

        let on_first = expand(&x, &[0], 2).unwrap();
        assert_eq!(on_first, tensor(&[x.clone(), id.clone()]));

        let on_second = expand(&x, &[1], 2).unwrap();
        assert_eq!(on_second, tensor(&[id, x]));
    }

    #[test]
    fn test_expand_reversed_cnot() {
        // CNOT with control 1 and target 0 flips particle 0 when particle 1 is set
        let full = expand(&gates::cnot(), &[1, 0], 2).unwrap();
        let mut state = zero_state(2);
        conjugate(&mut state, &expand(&gates::pauli_x(), &[1], 2).unwrap());
        conjugate(&mut state, &full);

        // |01⟩ -> |11⟩
        assert_relative_eq!(state[(3, 3)].re, 1.0);
    }

    #[test]
    fn test_expand_rejects_bad_input() {
        assert!(matches!(
            expand(&gates::cnot(), &[0], 2),
            Err(ArenaError::OperatorShape { expected: 2, .. })
        ));
        assert!(matches!(
            expand(&gates::pauli_x(), &[2], 2),
            Err(ArenaError::ParticleOutOfRange { index: 2, count: 2 })
        ));
        assert_eq!(
            expand(&gates::cnot(), &[1, 1], 2).unwrap_err(),
            ArenaError::RepeatedParticle(1)
        );
    }

    #[test]
    fn test_measure_collapses() {
        let mut state = zero_state(1);
        conjugate(&mut state, &gates::hadamard());
        assert_relative_eq!(probability_of_zero(&state, 1, 0), 0.5, epsilon = 1e-12);

        let outcome = measure(&mut state, 1, 0, 0.9);
        assert_eq!(outcome, 1);
        assert_relative_eq!(state[(1, 1)].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(state[(0, 1)].norm(), 0.0);

        // Measuring again is now deterministic
        assert_eq!(measure(&mut state, 1, 0, 0.0), 1);
    }

    #[test]
    fn test_measure_bell_pair_correlates() {
        let mut state = zero_state(2);
        conjugate(&mut state, &expand(&gates::hadamard(), &[0], 2).unwrap());
        conjugate(&mut state, &gates::cnot());

        let first = measure(&mut state, 2, 0, 0.25);
        let second = measure(&mut state, 2, 1, 0.75);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unitary_checks() {
        assert!(is_unitary(&gates::hadamard(), 1e-12));
        assert!(is_hermitian(&gates::pauli_y(), 1e-12));
        assert!(!is_unitary(&zero_state(1), 1e-12));
    }
}
