//! Standard operators and gate helpers for particle handles.
//!
//! Operators are plain [`Operator`] matrices; the helpers (`h`, `x`, `cnot`, …)
//! apply them to [`ParticleRef`]s through the arena's backend.

use crate::error::ArenaError;
use crate::linalg::Operator;
use crate::system::ParticleRef;
use nalgebra::Complex;
use rand::Rng;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

fn c(re: f64, im: f64) -> Complex<f64> {
    Complex::new(re, im)
}

fn matrix2(entries: [Complex<f64>; 4]) -> Operator {
    Operator::from_row_slice(2, 2, &entries)
}

/// Identity.
pub fn identity() -> Operator {
    Operator::identity(2, 2)
}

/// Hadamard gate.
pub fn hadamard() -> Operator {
    let s = FRAC_1_SQRT_2;
    matrix2([c(s, 0.0), c(s, 0.0), c(s, 0.0), c(-s, 0.0)])
}

/// Pauli-X (bit flip).
pub fn pauli_x() -> Operator {
    matrix2([c(0.0, 0.0), c(1.0, 0.0), c(1.0, 0.0), c(0.0, 0.0)])
}

/// Pauli-Y (bit and phase flip).
pub fn pauli_y() -> Operator {
    matrix2([c(0.0, 0.0), c(0.0, -1.0), c(0.0, 1.0), c(0.0, 0.0)])
}

/// Pauli-Z (phase flip).
pub fn pauli_z() -> Operator {
    matrix2([c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(-1.0, 0.0)])
}

/// Controlled-NOT; the first particle is the control.
pub fn cnot() -> Operator {
    let mut op = Operator::zeros(4, 4);
    op[(0, 0)] = c(1.0, 0.0);
    op[(1, 1)] = c(1.0, 0.0);
    op[(2, 3)] = c(1.0, 0.0);
    op[(3, 2)] = c(1.0, 0.0);
    op
}

/// Rotation about X by `angle`.
pub fn rx(angle: f64) -> Operator {
    let (s, co) = (angle / 2.0).sin_cos();
    matrix2([c(co, 0.0), c(0.0, -s), c(0.0, -s), c(co, 0.0)])
}

/// Rotation about Y by `angle`.
pub fn ry(angle: f64) -> Operator {
    let (s, co) = (angle / 2.0).sin_cos();
    matrix2([c(co, 0.0), c(-s, 0.0), c(s, 0.0), c(co, 0.0)])
}

/// Rotation about Z by `angle`.
pub fn rz(angle: f64) -> Operator {
    let (s, co) = (angle / 2.0).sin_cos();
    matrix2([c(co, -s), c(0.0, 0.0), c(0.0, 0.0), c(co, s)])
}

/// A random single-particle unitary `Rz(α)·Ry(β)·Rz(γ)`.
pub fn random_unitary<G: Rng + ?Sized>(rng: &mut G) -> Operator {
    let alpha = rng.gen_range(0.0..2.0 * PI);
    let beta = rng.gen_range(0.0..PI);
    let gamma = rng.gen_range(0.0..2.0 * PI);
    rz(alpha) * ry(beta) * rz(gamma)
}

/// Applies a Hadamard to a particle.
pub fn h(particle: &ParticleRef) -> Result<(), ArenaError> {
    particle.apply(&hadamard())
}

/// Applies Pauli-X to a particle.
pub fn x(particle: &ParticleRef) -> Result<(), ArenaError> {
    particle.apply(&pauli_x())
}

/// Applies Pauli-Y to a particle.
pub fn y(particle: &ParticleRef) -> Result<(), ArenaError> {
    particle.apply(&pauli_y())
}

/// Applies Pauli-Z to a particle.
pub fn z(particle: &ParticleRef) -> Result<(), ArenaError> {
    particle.apply(&pauli_z())
}

/// Applies CNOT to two particles of the same system.
pub fn cnot_on(control: &ParticleRef, target: &ParticleRef) -> Result<(), ArenaError> {
    ParticleRef::apply_joint(&[control, target], &cnot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::is_unitary;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_standard_gates_are_unitary() {
        for op in [identity(), hadamard(), pauli_x(), pauli_y(), pauli_z(), cnot()] {
            assert!(is_unitary(&op, 1e-12));
        }
        for angle in [0.0, 0.3, PI, 5.0] {
            assert!(is_unitary(&rx(angle), 1e-12));
            assert!(is_unitary(&ry(angle), 1e-12));
            assert!(is_unitary(&rz(angle), 1e-12));
        }
    }

    #[test]
    fn test_rx_pi_is_x_up_to_phase() {
        let op = rx(PI);
        // Rx(π) = -i X
        assert!((op[(0, 1)] - c(0.0, -1.0)).norm() < 1e-12);
        assert!(op[(0, 0)].norm() < 1e-12);
    }

    #[test]
    fn test_random_unitary() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..16 {
            assert!(is_unitary(&random_unitary(&mut rng), 1e-10));
        }
    }
}
