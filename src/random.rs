//! Shared random source
//!
//! A single process-wide generator guarded by a mutex. Pickers draw from it to
//! place their rotation cursors and to pick a weight bucket, so concurrent
//! pickers never need their own RNG state.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard};

static GLOBAL: Lazy<Arc<RandomSource>> = Lazy::new(|| Arc::new(RandomSource::from_entropy()));

/// Mutex-protected uniform generator
#[derive(Debug)]
pub struct RandomSource {
    rng: Mutex<StdRng>,
}

impl RandomSource {
    /// Create a generator seeded from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a deterministic generator, mostly useful in tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Uniform value in `[0, n)`. Returns 0 when `n` is 0.
    pub fn u32_below(&self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.lock().gen_range(0..n)
    }

    /// Uniform index in `[0, n)`. Returns 0 when `n` is 0.
    pub fn index_below(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.lock().gen_range(0..n)
    }

    fn lock(&self) -> MutexGuard<'_, StdRng> {
        // A panic while drawing cannot leave the generator in a bad state.
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// The process-wide generator shared by every picker and resolver
pub fn global() -> Arc<RandomSource> {
    Arc::clone(&GLOBAL)
}
