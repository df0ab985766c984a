//! Deterministic random streams for genome operations.
//!
//! Every random decision is drawn from a stream keyed by the run seed, the
//! generation, the population slot and the kind of operation. Streams never
//! share state, so the draws a genome sees do not depend on how work is
//! scheduled across threads.

use rand::prelude::*;
use rand_distr::StandardNormal;

/// Kind of operation a stream is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Initial population construction.
    Initialize = 1,
    /// Parent selection.
    Selection = 2,
    /// Crossover of two parents.
    Crossover = 3,
    /// Weight and activation mutation.
    Mutation = 4,
    /// Structural mutation (add-connection, add-node).
    Topology = 5,
}

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Independent stream for one operation on one population slot.
    pub fn stream(run_seed: u64, generation: usize, slot: usize, kind: StreamKind) -> Self {
        let mut state = splitmix64(run_seed);
        for word in [generation as u64, slot as u64, kind as u64] {
            state = splitmix64(state ^ word);
        }
        Self::new(state)
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        self.rng.r#gen::<f32>()
    }

    /// Bernoulli trial; probabilities outside `[0, 1]` are clamped.
    pub fn chance(&mut self, probability: f32) -> bool {
        self.rng.gen_bool(f64::from(probability.clamp(0.0, 1.0)))
    }

    /// Uniform float in `[-limit, limit]`.
    pub fn symmetric(&mut self, limit: f32) -> f32 {
        if limit <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-limit..=limit)
    }

    /// Normally distributed value with standard deviation `std`, clamped to `±bound`.
    pub fn bounded_normal(&mut self, std: f32, bound: f32) -> f32 {
        let noise: f32 = self.rng.sample(StandardNormal);
        (noise * std).clamp(-bound, bound)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Pick an element of a slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }
}

/// SplitMix64 finalizer used to derive stream seeds.
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
