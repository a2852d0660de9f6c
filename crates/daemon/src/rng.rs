use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Process-wide random source shared by the services.
///
/// Tests build it from a fixed seed so draws are reproducible.
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StdRng> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Uniform draw in `[lo, hi]`; swapped bounds are tolerated.
    pub fn between_i64(&self, lo: i64, hi: i64) -> i64 {
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        self.lock().gen_range(lo..=hi)
    }

    /// Uniform draw in `[lo, hi]`; swapped bounds are tolerated.
    pub fn between_u32(&self, lo: u32, hi: u32) -> u32 {
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        self.lock().gen_range(lo..=hi)
    }

    pub fn shuffle<T>(&self, items: &mut [T]) {
        items.shuffle(&mut *self.lock());
    }

    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut *self.lock())
    }
}
