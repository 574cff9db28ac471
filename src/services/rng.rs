use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Seeded generator for position ids, asset ids and salts.
///
/// Seeding from `RANDOM_SEED` makes a run's identifiers reproducible.
#[derive(Debug)]
pub struct HarnessRng {
    inner: Mutex<StdRng>,
}

impl HarnessRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// Uniform in `[1, 2^32 - 1]`.
    pub fn nonzero_u32(&self) -> u32 {
        self.with(|rng| rng.gen_range(1..=u32::MAX))
    }

    /// Uniform in `[0, 2^32 - 1]`.
    pub fn salt(&self) -> u64 {
        self.with(|rng| u64::from(rng.r#gen::<u32>()))
    }
}
