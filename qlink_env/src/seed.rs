//! Deterministic seed derivation.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const GOLDEN_RATIO: u64 = 0x9e3779b97f4a7c15;
const MIX: u64 = 0x517cc1b727220a95;

/// Derives reproducible sub-seeds from one master seed.
///
/// Every random stream in a run (one per agent, one per channel direction)
/// is derived from the master seed and a label, so:
/// - Deterministic: same master seed + label always gives the same stream
/// - Unique: distinct labels give distinct streams
/// - Isolated: adding agents or channels doesn't perturb existing streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSequence {
    master: u64,
}

impl SeedSequence {
    /// Creates a sequence from a master seed.
    pub fn new(master: u64) -> Self {
        Self { master }
    }

    /// Returns the master seed.
    pub fn master(&self) -> u64 {
        self.master
    }

    /// Derives the sub-seed for a label.
    pub fn derive(&self, label: &str) -> u64 {
        self.master
            .wrapping_mul(GOLDEN_RATIO)
            .wrapping_add(label_hash(label).wrapping_mul(MIX))
    }

    /// Derives a sequence scoped under a label (e.g. one per agent).
    pub fn child(&self, label: &str) -> SeedSequence {
        SeedSequence::new(self.derive(label))
    }

    /// Builds the RNG for a label.
    pub fn rng(&self, label: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.derive(label))
    }
}

/// FNV-1a over the label bytes. Stable across platforms and releases.
fn label_hash(label: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in label.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
