//! Random-number sources consumed by tree traversal.
//!
//! Traversal never owns a generator: callers pass a [`UniformSource`] so the
//! order of draws stays under the control of the population loop.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// A stream of uniform draws in `[0, 1)`.
pub trait UniformSource {
    fn uniform(&mut self) -> f64;
}

/// Seedable simulation stream backed by ChaCha20.
///
/// A seed yields the same stream on every platform and rand release.
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: ChaCha20Rng,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Independent stream for one individual (or any other stream id).
    ///
    /// The derived seed depends only on `(seed, stream)`, so individuals can
    /// be resolved in any order or in parallel without changing their draws.
    pub fn substream(seed: u64, stream: u64) -> Self {
        Self::new(splitmix64(seed ^ splitmix64(stream)))
    }
}

impl UniformSource for SimRng {
    fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Fixed sequence of draws, mainly for tests and replaying recorded runs.
///
/// Panics when more draws are requested than were scripted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDraws {
    draws: Vec<f64>,
    next: usize,
}

impl ScriptedDraws {
    pub fn new(draws: impl Into<Vec<f64>>) -> Self {
        Self {
            draws: draws.into(),
            next: 0,
        }
    }

    /// Number of draws consumed so far
    pub fn consumed(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.draws.len() - self.next
    }
}

impl UniformSource for ScriptedDraws {
    fn uniform(&mut self) -> f64 {
        let draw = *self
            .draws
            .get(self.next)
            .unwrap_or_else(|| panic!("scripted draws exhausted after {} draws", self.next));
        self.next += 1;
        draw
    }
}
