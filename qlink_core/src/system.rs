//! Handles into the arena: [`SystemView`] and [`ParticleRef`].
//!
//! A `SystemView` is addressing plus a single-pass particle cursor. A
//! `ParticleRef` names one particle of one system and is the only thing that
//! ever travels over a quantum channel; the matrices themselves never move.

use crate::arena::QuantumArena;
use crate::error::ArenaError;
use crate::linalg::Operator;
use crate::ownership::Holder;
use crate::transmit::Transmit;
use rand::{Rng, RngCore};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

/// View of one system of the arena.
pub struct SystemView {
    arena: Arc<QuantumArena>,
    index: usize,
    holder: Holder,
    /// Next particle `qubits()` will hand out
    cursor: usize,
}

impl SystemView {
    pub(crate) fn new(arena: Arc<QuantumArena>, index: usize, holder: Holder) -> Self {
        Self { arena, index, holder, cursor: 0 }
    }

    /// Returns the system index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the number of particles in the system.
    pub fn num_qubits(&self) -> usize {
        self.arena.qubits_per_system()
    }

    /// Returns who this view operates for.
    pub fn holder(&self) -> Holder {
        self.holder
    }

    /// Hands out the system's particles, in order, exactly once.
    ///
    /// The cursor lives in the view: a second call after the first one was
    /// exhausted yields nothing, and a partially consumed iteration resumes
    /// where it stopped.
    pub fn qubits(&mut self) -> Qubits<'_> {
        Qubits { view: self }
    }

    /// Returns a handle to particle `i` without touching the cursor.
    pub fn qubit(&self, i: usize) -> Result<ParticleRef, ArenaError> {
        self.arena.check_particle(self.index, i)?;
        Ok(self.particle(i))
    }

    /// Applies a full-system operator (`2^n × 2^n`).
    ///
    /// Every particle of the system must be usable by this view's holder.
    pub fn apply(&self, operator: &Operator) -> Result<(), ArenaError> {
        let targets: Vec<usize> = (0..self.num_qubits()).collect();
        self.arena.apply(self.index, &targets, operator, self.holder)
    }

    /// Returns a copy of the system's density matrix.
    pub fn state(&self) -> Result<Operator, ArenaError> {
        self.arena.state(self.index)
    }

    fn particle(&self, i: usize) -> ParticleRef {
        ParticleRef {
            arena: Arc::clone(&self.arena),
            system: self.index,
            particle: i,
            holder: self.holder,
        }
    }
}

impl fmt::Debug for SystemView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemView")
            .field("index", &self.index)
            .field("holder", &self.holder)
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// Single-pass iterator over a system's particles. See [`SystemView::qubits`].
pub struct Qubits<'a> {
    view: &'a mut SystemView,
}

impl Iterator for Qubits<'_> {
    type Item = ParticleRef;

    fn next(&mut self) -> Option<ParticleRef> {
        if self.view.cursor >= self.view.num_qubits() {
            return None;
        }
        let particle = self.view.particle(self.view.cursor);
        self.view.cursor += 1;
        Some(particle)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.view.num_qubits().saturating_sub(self.view.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Qubits<'_> {}

impl FusedIterator for Qubits<'_> {}

/// Handle to one particle.
///
/// Not `Clone`: sending a particle hands the handle over, measuring it
/// consumes it.
pub struct ParticleRef {
    arena: Arc<QuantumArena>,
    system: usize,
    particle: usize,
    holder: Holder,
}

impl ParticleRef {
    /// Returns `(system_index, particle_index)`.
    pub fn address(&self) -> (usize, usize) {
        (self.system, self.particle)
    }

    /// Returns the system index.
    pub fn system_index(&self) -> usize {
        self.system
    }

    /// Returns the particle index within its system.
    pub fn particle_index(&self) -> usize {
        self.particle
    }

    /// Returns who currently holds this handle.
    pub fn holder(&self) -> Holder {
        self.holder
    }

    /// Applies a single-particle operator.
    pub fn apply(&self, operator: &Operator) -> Result<(), ArenaError> {
        self.arena.apply(self.system, &[self.particle], operator, self.holder)
    }

    /// Applies a multi-particle operator to `particles`, in the given order.
    ///
    /// All particles must belong to the same system. An empty list is a no-op.
    pub fn apply_joint(particles: &[&ParticleRef], operator: &Operator) -> Result<(), ArenaError> {
        let Some(first) = particles.first() else {
            return Ok(());
        };
        for p in &particles[1..] {
            if p.system != first.system || !Arc::ptr_eq(&p.arena, &first.arena) {
                return Err(ArenaError::NotSameSystem(first.system, p.system));
            }
        }
        let targets: Vec<usize> = particles.iter().map(|p| p.particle).collect();
        first.arena.apply(first.system, &targets, operator, first.holder)
    }

    /// Measures the particle in the computational basis, consuming the handle.
    pub fn measure<G: Rng + ?Sized>(self, rng: &mut G) -> Result<u8, ArenaError> {
        let sample = rng.gen::<f64>();
        self.arena.measure(self.system, self.particle, sample, self.holder)
    }
}

impl fmt::Debug for ParticleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleRef")
            .field("system", &self.system)
            .field("particle", &self.particle)
            .field("holder", &self.holder)
            .finish()
    }
}

impl Transmit for ParticleRef {
    fn pulses(&self) -> usize {
        1
    }

    fn claim(&self) -> Result<(), ArenaError> {
        self.arena.check_particle(self.system, self.particle)?;
        self.arena.ledger().authorize(self.system, self.particle, self.holder)
    }

    fn depart(&self) -> Result<(), ArenaError> {
        self.arena.ledger().depart(self.system, self.particle, self.holder)
    }

    fn arrive(&mut self, holder: Holder) {
        self.arena.ledger().arrive(self.system, self.particle, holder);
        self.holder = holder;
    }

    fn lose(self, rng: &mut dyn RngCore) {
        // Loss is detection by the environment: the particle collapses.
        let sample = rng.gen::<f64>();
        if let Err(err) = self.arena.measure(self.system, self.particle, sample, self.holder) {
            tracing::warn!(system = self.system, particle = self.particle, %err, "could not collapse lost particle");
        }
        self.arena.ledger().mark_lost(self.system, self.particle);
    }
}
