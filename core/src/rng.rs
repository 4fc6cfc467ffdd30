//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! All randomness flows through StreamRng instances derived
//! from the single master seed held by the engine.
//!
//! A stream is addressed by (slot, salt). The salt is a per-draw
//! counter owned by the caller, so every market series and every
//! asset pick reads from a fresh, independent stream while a given
//! seed still replays byte-identically.
//!
//! Randomness is cosmetic only. No stream is ever consulted to
//! decide whether a stage wins.

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single stream.
pub struct StreamRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StreamRng {
    pub fn new(master_seed: u64, slot: StreamSlot, salt: u64) -> Self {
        let derived_seed = master_seed
            ^ (slot as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ salt.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        Self {
            name: slot.name(),
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a float in [lo, hi). Returns `lo` when the range is empty
    /// or not finite.
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        let width = hi - lo;
        if !width.is_finite() || width <= 0.0 {
            return lo;
        }
        self.inner.gen_range(lo..hi)
    }

    /// Roll an index in [0, n).
    pub fn index_below(&mut self, n: usize) -> usize {
        assert!(n > 0, "n must be > 0");
        self.inner.gen_range(0..n)
    }
}

/// Hands out streams for a single run.
#[derive(Debug, Clone)]
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn for_stream(&self, slot: StreamSlot, salt: u64) -> StreamRng {
        StreamRng::new(self.master_seed, slot, salt)
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries; only append.
/// Reordering changes every stream's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Market       = 0,
    Asset        = 1,
    Notification = 2,
}

impl StreamSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Market       => "market",
            Self::Asset        => "asset",
            Self::Notification => "notification",
        }
    }
}
