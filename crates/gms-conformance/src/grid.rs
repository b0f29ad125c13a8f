//! Seeded parameter grids.
//!
//! Each provider owns one [`ParameterGrid`] derived from the harness seed
//! and its own name, so providers are reproducible and independent of the
//! order in which they run.

use gms_random::{DeterministicRng, sample_range};
use serde::Serialize;

/// `count` distinct values from the half-open range `[lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridSpec {
    pub lo: usize,
    pub hi: usize,
    pub count: usize,
}

impl GridSpec {
    #[must_use]
    pub const fn new(lo: usize, hi: usize, count: usize) -> Self {
        Self { lo, hi, count }
    }

    #[must_use]
    pub fn contains(&self, value: usize) -> bool {
        (self.lo..self.hi).contains(&value)
    }
}

#[derive(Debug, Clone)]
pub struct ParameterGrid {
    provider: &'static str,
    rng: DeterministicRng,
}

impl ParameterGrid {
    #[must_use]
    pub fn for_provider(seed: u64, provider: &'static str) -> Self {
        Self {
            provider,
            rng: DeterministicRng::for_stream(seed, provider),
        }
    }

    pub fn draw(&mut self, spec: GridSpec) -> Result<Vec<usize>, String> {
        sample_range(&mut self.rng, spec.lo, spec.hi, spec.count)
            .map_err(|err| format!("{} grid {spec:?}: {err}", self.provider))
    }

    /// Source for the random inputs of the provider's cases.
    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }
}
