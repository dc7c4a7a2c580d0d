//! Display jitter applied to collaborator predictions

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of the minute offset added to a collaborator prediction
pub trait JitterSource: Send + Sync {
    /// Offset in minutes, within `[-2, 4]`
    fn offset_minutes(&self) -> i64;
}

/// Random jitter: a symmetric spread in `[-2, 2]` plus a shift in `[0, 2]`
#[derive(Debug)]
pub struct RandomJitter {
    rng: Mutex<StdRng>,
}

impl RandomJitter {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence, for simulations
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSource for RandomJitter {
    fn offset_minutes(&self) -> i64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(-2..=2) + rng.gen_range(0..=2),
            // A poisoned generator only loses the jitter
            Err(_) => 0,
        }
    }
}

/// No jitter at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn offset_minutes(&self) -> i64 {
        0
    }
}

/// Always the same offset
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub i64);

impl JitterSource for FixedJitter {
    fn offset_minutes(&self) -> i64 {
        self.0
    }
}
