//! Ownership ledger for the particles of a [`QuantumArena`](crate::QuantumArena).
//!
//! The arena is shared memory; the ledger is what turns "only one agent
//! touches a particle at a time" from a convention into a checked rule.
//! Each particle has one atomic cell recording who may operate on it:
//!
//! ```text
//!            first use by agent A          send()             recv() by B
//! Unclaimed ─────────────────────▶ Held(A) ───────▶ InTransit ──────────▶ Held(B)
//!                                      │                │
//!                                      └── attenuation ─┴──────▶ Lost
//! ```
//!
//! The driver (holder [`Holder::DRIVER`]) may only touch unclaimed particles,
//! which is how initial states are prepared before the agents start.

use crate::error::ArenaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

const UNCLAIMED: u32 = 0;
const IN_TRANSIT: u32 = u32::MAX;
const LOST: u32 = u32::MAX - 1;

/// Token identifying who is operating on the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Holder(u32);

impl Holder {
    /// The orchestrating driver, outside any agent.
    pub const DRIVER: Holder = Holder(UNCLAIMED);

    /// Returns the raw token.
    pub fn token(&self) -> u32 {
        self.0
    }

    /// Returns true for the driver.
    pub fn is_driver(&self) -> bool {
        self.0 == UNCLAIMED
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_driver() {
            f.write_str("driver")
        } else {
            write!(f, "agent#{}", self.0)
        }
    }
}

/// Where a particle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleStatus {
    /// Nobody has used it yet
    Unclaimed,
    /// Held by an agent
    Held(Holder),
    /// Sent, not yet received
    InTransit,
    /// Lost in transit
    Lost,
}

impl ParticleStatus {
    fn decode(raw: u32) -> Self {
        match raw {
            UNCLAIMED => Self::Unclaimed,
            IN_TRANSIT => Self::InTransit,
            LOST => Self::Lost,
            token => Self::Held(Holder(token)),
        }
    }
}

impl fmt::Display for ParticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclaimed => f.write_str("unclaimed"),
            Self::Held(holder) => write!(f, "held by {holder}"),
            Self::InTransit => f.write_str("in transit"),
            Self::Lost => f.write_str("lost"),
        }
    }
}

/// One atomic cell per particle, laid out system-major.
pub(crate) struct OwnershipLedger {
    cells: Box<[AtomicU32]>,
    particles_per_system: usize,
    next_token: AtomicU32,
}

impl OwnershipLedger {
    pub(crate) fn new(system_count: usize, particles_per_system: usize) -> Self {
        let cells = (0..system_count * particles_per_system)
            .map(|_| AtomicU32::new(UNCLAIMED))
            .collect();
        Self {
            cells,
            particles_per_system,
            next_token: AtomicU32::new(1),
        }
    }

    /// Issues a fresh holder token for a new agent.
    pub(crate) fn register(&self) -> Holder {
        Holder(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    fn cell(&self, system: usize, particle: usize) -> &AtomicU32 {
        &self.cells[system * self.particles_per_system + particle]
    }

    pub(crate) fn status(&self, system: usize, particle: usize) -> ParticleStatus {
        ParticleStatus::decode(self.cell(system, particle).load(Ordering::Acquire))
    }

    /// Checks that `holder` may operate on the particle, claiming it on first use.
    pub(crate) fn authorize(
        &self,
        system: usize,
        particle: usize,
        holder: Holder,
    ) -> Result<(), ArenaError> {
        self.claim(system, particle, holder).map(drop)
    }

    /// Like [`authorize`](Self::authorize); `Ok(true)` when this call made the claim.
    pub(crate) fn claim(
        &self,
        system: usize,
        particle: usize,
        holder: Holder,
    ) -> Result<bool, ArenaError> {
        let cell = self.cell(system, particle);
        let current = if holder.is_driver() {
            cell.load(Ordering::Acquire)
        } else {
            match cell.compare_exchange(UNCLAIMED, holder.0, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(true),
                Err(current) => current,
            }
        };

        match current {
            c if c == holder.0 => Ok(false),
            LOST => Err(ArenaError::ParticleLost { system, particle }),
            c => Err(ArenaError::NotHolder {
                system,
                particle,
                holder: holder.to_string(),
                status: ParticleStatus::decode(c),
            }),
        }
    }

    /// Gives back a claim `holder` made, if it still holds the particle.
    pub(crate) fn release(&self, system: usize, particle: usize, holder: Holder) {
        if !holder.is_driver() {
            let _ = self.cell(system, particle).compare_exchange(
                holder.0,
                UNCLAIMED,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    /// Moves the particle out of `holder`'s hands and into transit.
    pub(crate) fn depart(
        &self,
        system: usize,
        particle: usize,
        holder: Holder,
    ) -> Result<(), ArenaError> {
        self.authorize(system, particle, holder)?;
        self.cell(system, particle).store(IN_TRANSIT, Ordering::Release);
        Ok(())
    }

    /// Hands a particle in transit over to its receiver.
    pub(crate) fn arrive(&self, system: usize, particle: usize, holder: Holder) {
        self.cell(system, particle).store(holder.0, Ordering::Release);
    }

    pub(crate) fn mark_lost(&self, system: usize, particle: usize) {
        self.cell(system, particle).store(LOST, Ordering::Release);
    }

    /// Forgets every claim.
    pub(crate) fn clear(&self) {
        for cell in self.cells.iter() {
            cell.store(UNCLAIMED, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_use_claims() {
        let ledger = OwnershipLedger::new(2, 3);
        let alice = ledger.register();
        let bob = ledger.register();

        assert_eq!(ledger.status(0, 1), ParticleStatus::Unclaimed);
        ledger.authorize(0, 1, alice).unwrap();
        assert_eq!(ledger.status(0, 1), ParticleStatus::Held(alice));

        // Bob cannot use Alice's particle
        let err = ledger.authorize(0, 1, bob).unwrap_err();
        assert!(matches!(err, ArenaError::NotHolder { system: 0, particle: 1, .. }));

        // Other particles are unaffected
        ledger.authorize(0, 2, bob).unwrap();
    }

    #[test]
    fn test_transfer() {
        let ledger = OwnershipLedger::new(1, 2);
        let alice = ledger.register();
        let bob = ledger.register();

        ledger.authorize(0, 0, alice).unwrap();
        ledger.depart(0, 0, alice).unwrap();
        assert_eq!(ledger.status(0, 0), ParticleStatus::InTransit);

        // Nobody can use a particle in flight, not even the sender
        assert!(ledger.authorize(0, 0, alice).is_err());

        ledger.arrive(0, 0, bob);
        assert_eq!(ledger.status(0, 0), ParticleStatus::Held(bob));
        assert!(ledger.authorize(0, 0, alice).is_err());
        ledger.authorize(0, 0, bob).unwrap();
    }

    #[test]
    fn test_driver_only_touches_unclaimed() {
        let ledger = OwnershipLedger::new(1, 1);
        let alice = ledger.register();

        ledger.authorize(0, 0, Holder::DRIVER).unwrap();
        // The driver does not claim
        assert_eq!(ledger.status(0, 0), ParticleStatus::Unclaimed);

        ledger.authorize(0, 0, alice).unwrap();
        assert!(ledger.authorize(0, 0, Holder::DRIVER).is_err());

        ledger.clear();
        ledger.authorize(0, 0, Holder::DRIVER).unwrap();
    }

    #[test]
    fn test_claim_and_release() {
        let ledger = OwnershipLedger::new(1, 1);
        let alice = ledger.register();
        let bob = ledger.register();

        assert!(ledger.claim(0, 0, alice).unwrap());
        assert!(!ledger.claim(0, 0, alice).unwrap());

        // Only the holder can give a claim back
        ledger.release(0, 0, bob);
        assert_eq!(ledger.status(0, 0), ParticleStatus::Held(alice));
        ledger.release(0, 0, alice);
        assert_eq!(ledger.status(0, 0), ParticleStatus::Unclaimed);
    }

    #[test]
    fn test_lost_particle() {
        let ledger = OwnershipLedger::new(1, 1);
        let alice = ledger.register();
        ledger.mark_lost(0, 0);

        assert_eq!(
            ledger.authorize(0, 0, alice).unwrap_err(),
            ArenaError::ParticleLost { system: 0, particle: 0 }
        );
    }

    #[test]
    fn test_tokens_are_unique() {
        let ledger = OwnershipLedger::new(1, 1);
        let a = ledger.register();
        let b = ledger.register();
        assert_ne!(a, b);
        assert!(!a.is_driver());
    }
}
