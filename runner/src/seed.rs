//! Per-iteration sampling seeds.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Smallest seed ever drawn. Seeds span `SEED_MIN..=u64::MAX`.
pub const SEED_MIN: u64 = 1;

/// Source of the seed handed to each loop iteration.
pub trait SeedSource {
    fn next_seed(&mut self) -> u64;
}

/// Uniform seeds from a `StdRng`.
pub struct RandomSeeds {
    rng: StdRng,
}

impl RandomSeeds {
    /// Seeds from OS entropy; every run differs.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible seed sequence derived from `base`.
    pub fn from_base(base: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(base),
        }
    }

    pub fn from_config(base: Option<u64>) -> Self {
        match base {
            Some(base) => Self::from_base(base),
            None => Self::from_entropy(),
        }
    }
}

impl SeedSource for RandomSeeds {
    fn next_seed(&mut self) -> u64 {
        self.rng.gen_range(SEED_MIN..=u64::MAX)
    }
}
