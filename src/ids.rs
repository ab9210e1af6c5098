//! Order-id generation.
//!
//! Ids are random 64-bit values rendered as fixed-width lowercase hex;
//! collision probability is negligible over a process lifetime. The
//! generator is owned by the reactor, so access is single-threaded.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generator for opaque 16-character hex order ids.
pub struct IdGenerator {
    rng: StdRng,
}

impl IdGenerator {
    /// Seed from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next id: 16 lowercase hex chars, zero-padded.
    pub fn next(&mut self) -> String {
        format!("{:016x}", self.rng.gen::<u64>())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
