//! The shared quantum arena.
//!
//! One arena holds every quantum system of a run: `system_count` disjoint
//! systems of `qubits_per_system` particles, each stored as a
//! `2^n × 2^n` density matrix. It is allocated once by the driver,
//! shared by every agent through an `Arc`, and never resized.
//!
//! # Concurrency
//!
//! Agents mutate the arena directly from their own threads. Each system is
//! guarded only for the duration of one backend call (never across a channel
//! wait), so two agents can never race on the same matrix. Who is *allowed*
//! to operate on a particle is decided by the [ownership ledger](crate::ownership):
//! particles change hands only through channel transfers.

use crate::backend::{DensityMatrixBackend, QuantumBackend};
use crate::error::{ArenaError, ConfigError};
use crate::linalg::{self, Operator};
use crate::ownership::{Holder, OwnershipLedger, ParticleStatus};
use crate::system::SystemView;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Largest supported system: 10 particles, i.e. 1024×1024 matrices.
pub const MAX_QUBITS_PER_SYSTEM: usize = 10;

/// Shared storage for every quantum system of a simulation run.
pub struct QuantumArena {
    /// Particles per system
    qubits_per_system: usize,

    /// Matrix side length (2^qubits_per_system)
    dimension: usize,

    /// One density matrix per system
    systems: Box<[Mutex<Operator>]>,

    /// Who may operate on each particle
    ledger: OwnershipLedger,

    /// Math collaborator
    backend: Box<dyn QuantumBackend>,
}

impl QuantumArena {
    /// Allocates an arena of `system_count` zero-state systems using the
    /// density-matrix backend.
    ///
    /// # Errors
    /// * `ConfigError::SystemSize` - `qubits_per_system` is 0 or too large
    /// * `ConfigError::EmptyArena` - `system_count` is 0
    pub fn allocate(qubits_per_system: usize, system_count: usize) -> Result<Arc<Self>, ConfigError> {
        Self::allocate_with_backend(qubits_per_system, system_count, DensityMatrixBackend)
    }

    /// Allocates an arena with a custom backend.
    pub fn allocate_with_backend<B: QuantumBackend>(
        qubits_per_system: usize,
        system_count: usize,
        backend: B,
    ) -> Result<Arc<Self>, ConfigError> {
        if qubits_per_system == 0 || qubits_per_system > MAX_QUBITS_PER_SYSTEM {
            return Err(ConfigError::SystemSize {
                qubits: qubits_per_system,
                max: MAX_QUBITS_PER_SYSTEM,
            });
        }
        if system_count == 0 {
            return Err(ConfigError::EmptyArena);
        }

        let mut initial = Operator::zeros(0, 0);
        backend.reset(&mut initial, qubits_per_system);
        let systems = (0..system_count)
            .map(|_| Mutex::new(initial.clone()))
            .collect();

        tracing::debug!(
            qubits_per_system,
            system_count,
            backend = backend.name(),
            "allocated quantum arena"
        );

        Ok(Arc::new(Self {
            qubits_per_system,
            dimension: 1 << qubits_per_system,
            systems,
            ledger: OwnershipLedger::new(system_count, qubits_per_system),
            backend: Box::new(backend),
        }))
    }

    /// Returns the number of particles in each system.
    pub fn qubits_per_system(&self) -> usize {
        self.qubits_per_system
    }

    /// Returns the matrix side length of each system.
    pub fn system_dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the number of systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Returns the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Views a system as the driver.
    ///
    /// Driver views may only operate on particles no agent has claimed yet;
    /// they are meant for preparing initial states before a run.
    pub fn view_system(self: &Arc<Self>, index: usize) -> Result<SystemView, ArenaError> {
        self.view_as(index, Holder::DRIVER)
    }

    pub(crate) fn view_as(self: &Arc<Self>, index: usize, holder: Holder) -> Result<SystemView, ArenaError> {
        self.check_system(index)?;
        Ok(SystemView::new(Arc::clone(self), index, holder))
    }

    /// Returns a copy of a system's density matrix.
    pub fn state(&self, index: usize) -> Result<Operator, ArenaError> {
        Ok(self.lock(index)?.clone())
    }

    /// Returns where a particle currently is.
    pub fn particle_status(&self, system: usize, particle: usize) -> Result<ParticleStatus, ArenaError> {
        self.check_particle(system, particle)?;
        Ok(self.ledger.status(system, particle))
    }

    /// Resets every system to the zero state and forgets all claims.
    ///
    /// Only meaningful between runs: no agent may be running.
    pub fn reset(&self) {
        for slot in self.systems.iter() {
            let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
            self.backend.reset(&mut state, self.qubits_per_system);
        }
        self.ledger.clear();
    }

    pub(crate) fn register_holder(&self) -> Holder {
        self.ledger.register()
    }

    pub(crate) fn ledger(&self) -> &OwnershipLedger {
        &self.ledger
    }

    pub(crate) fn check_system(&self, index: usize) -> Result<(), ArenaError> {
        if index < self.systems.len() {
            Ok(())
        } else {
            Err(ArenaError::SystemOutOfRange {
                index,
                count: self.systems.len(),
            })
        }
    }

    pub(crate) fn check_particle(&self, system: usize, particle: usize) -> Result<(), ArenaError> {
        self.check_system(system)?;
        if particle < self.qubits_per_system {
            Ok(())
        } else {
            Err(ArenaError::ParticleOutOfRange {
                index: particle,
                count: self.qubits_per_system,
            })
        }
    }

    fn lock(&self, index: usize) -> Result<MutexGuard<'_, Operator>, ArenaError> {
        self.check_system(index)?;
        // A panicking agent cannot leave a matrix half-written: backend calls
        // replace the state wholesale, so a poisoned guard is still consistent.
        Ok(self.systems[index].lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Applies an operator to `targets` of system `index` on behalf of `holder`.
    pub(crate) fn apply(
        &self,
        index: usize,
        targets: &[usize],
        operator: &Operator,
        holder: Holder,
    ) -> Result<(), ArenaError> {
        for &particle in targets {
            self.check_particle(index, particle)?;
        }
        // A rejected call undoes the claims it made
        let mut claimed = Vec::with_capacity(targets.len());
        let mut result = Ok(());
        for &particle in targets {
            match self.ledger.claim(index, particle, holder) {
                Ok(true) => claimed.push(particle),
                Ok(false) => {}
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        if result.is_ok() {
            let mut state = self.lock(index)?;
            result = self.backend.apply(&mut state, self.qubits_per_system, targets, operator);
        }
        if result.is_err() {
            for &particle in &claimed {
                self.ledger.release(index, particle, holder);
            }
        }
        result
    }

    /// Measures one particle on behalf of `holder`.
    pub(crate) fn measure(
        &self,
        index: usize,
        particle: usize,
        sample: f64,
        holder: Holder,
    ) -> Result<u8, ArenaError> {
        self.check_particle(index, particle)?;
        self.ledger.authorize(index, particle, holder)?;
        let mut state = self.lock(index)?;
        Ok(self.backend.measure(&mut state, self.qubits_per_system, particle, sample))
    }

    /// Probability that measuring `particle` of system `index` gives 0.
    pub fn probability_of_zero(&self, index: usize, particle: usize) -> Result<f64, ArenaError> {
        self.check_particle(index, particle)?;
        let state = self.lock(index)?;
        Ok(linalg::probability_of_zero(&state, self.qubits_per_system, particle))
    }
}

impl fmt::Debug for QuantumArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantumArena")
            .field("qubits_per_system", &self.qubits_per_system)
            .field("system_count", &self.systems.len())
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_allocate() {
        let arena = QuantumArena::allocate(3, 10).unwrap();
        assert_eq!(arena.qubits_per_system(), 3);
        assert_eq!(arena.system_dimension(), 8);
        assert_eq!(arena.system_count(), 10);

        let state = arena.state(9).unwrap();
        assert_eq!(state.nrows(), 8);
        assert_relative_eq!(state[(0, 0)].re, 1.0);
    }

    #[test]
    fn test_allocate_rejects_bad_shapes() {
        assert_eq!(
            QuantumArena::allocate(0, 4).unwrap_err(),
            ConfigError::SystemSize { qubits: 0, max: MAX_QUBITS_PER_SYSTEM }
        );
        assert!(QuantumArena::allocate(MAX_QUBITS_PER_SYSTEM + 1, 1).is_err());
        assert_eq!(QuantumArena::allocate(2, 0).unwrap_err(), ConfigError::EmptyArena);
    }

    #[test]
    fn test_view_bounds() {
        let arena = QuantumArena::allocate(2, 4).unwrap();
        for i in 0..4 {
            assert_eq!(arena.view_system(i).unwrap().index(), i);
        }
        assert_eq!(
            arena.view_system(4).unwrap_err(),
            ArenaError::SystemOutOfRange { index: 4, count: 4 }
        );
    }

    #[test]
    fn test_systems_are_disjoint() {
        let arena = QuantumArena::allocate(1, 2).unwrap();
        let q = arena.view_system(0).unwrap().qubit(0).unwrap();
        gates::x(&q).unwrap();

        assert_relative_eq!(arena.probability_of_zero(0, 0).unwrap(), 0.0);
        assert_relative_eq!(arena.probability_of_zero(1, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_reset() {
        let arena = QuantumArena::allocate(1, 1).unwrap();
        let holder = arena.register_holder();
        arena.apply(0, &[0], &gates::pauli_x(), holder).unwrap();
        assert_eq!(arena.particle_status(0, 0).unwrap(), ParticleStatus::Held(holder));

        arena.reset();
        assert_eq!(arena.particle_status(0, 0).unwrap(), ParticleStatus::Unclaimed);
        assert_relative_eq!(arena.probability_of_zero(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_rejected_joint_apply_keeps_no_claims() {
        let arena = QuantumArena::allocate(2, 1).unwrap();
        let alice = arena.register_holder();
        let bob = arena.register_holder();
        arena.apply(0, &[1], &gates::pauli_x(), alice).unwrap();

        let err = arena.apply(0, &[0, 1], &gates::cnot(), bob).unwrap_err();
        assert!(matches!(err, ArenaError::NotHolder { particle: 1, .. }));
        assert_eq!(arena.particle_status(0, 0).unwrap(), ParticleStatus::Unclaimed);
        assert_eq!(arena.particle_status(0, 1).unwrap(), ParticleStatus::Held(alice));
        // No gate ran
        assert_relative_eq!(arena.probability_of_zero(0, 0).unwrap(), 1.0);
        assert_relative_eq!(arena.probability_of_zero(0, 1).unwrap(), 0.0);

        // A wrongly sized operator is rejected by the backend, also without claims
        assert!(arena.apply(0, &[0], &gates::cnot(), bob).is_err());
        assert_eq!(arena.particle_status(0, 0).unwrap(), ParticleStatus::Unclaimed);
    }

    #[test]
    fn test_arena_is_shared_across_threads() {
        let arena = QuantumArena::allocate(1, 8).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let arena = Arc::clone(&arena);
                std::thread::spawn(move || {
                    let holder = arena.register_holder();
                    // Each thread flips its own two systems
                    for index in [2 * t, 2 * t + 1] {
                        arena.apply(index, &[0], &gates::pauli_x(), holder).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for index in 0..8 {
            assert_relative_eq!(arena.probability_of_zero(index, 0).unwrap(), 0.0);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: every in-range index gives a stable view of that system,
        /// everything past the end is a bounds error.
        #[test]
        fn prop_view_addressing(qubits in 1usize..4, count in 1usize..32, index in 0usize..64) {
            let arena = QuantumArena::allocate(qubits, count).unwrap();
            match arena.view_system(index) {
                Ok(view) => {
                    prop_assert!(index < count);
                    prop_assert_eq!(view.index(), index);
                    prop_assert_eq!(view.num_qubits(), qubits);
                    prop_assert_eq!(arena.view_system(index).unwrap().index(), index);
                }
                Err(err) => {
                    prop_assert!(index >= count);
                    prop_assert_eq!(err, ArenaError::SystemOutOfRange { index, count });
                }
            }
        }
    }
}
