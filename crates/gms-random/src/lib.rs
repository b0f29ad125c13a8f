#![forbid(unsafe_code)]

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_CONST1: u64 = 0xBF58_476D_1CE4_E5B9;
const MIX_CONST2: u64 = 0x94D0_49BB_1331_11EB;
const FNV_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
pub const DEFAULT_FIXTURE_SEED: u64 = 0x6E0D_E51C_F1A7_0001;

pub const RANDOM_REASON_CODES: [&str; 2] = [
    "random_upper_bound_rejected",
    "random_sample_range_invalid",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomError {
    InvalidUpperBound,
    SampleLargerThanRange { lo: usize, hi: usize, count: usize },
}

impl RandomError {
    #[must_use]
    pub const fn reason_code(self) -> &'static str {
        match self {
            Self::InvalidUpperBound => "random_upper_bound_rejected",
            Self::SampleLargerThanRange { .. } => "random_sample_range_invalid",
        }
    }
}

impl std::fmt::Display for RandomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUpperBound => write!(f, "upper_bound must be > 0"),
            Self::SampleLargerThanRange { lo, hi, count } => write!(
                f,
                "cannot draw {count} distinct values from range [{lo}, {hi})"
            ),
        }
    }
}

impl std::error::Error for RandomError {}

/// Counter-based splitmix64 stream. Cheap to clone and fully determined by
/// `(seed, counter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicRng {
    stream_seed: u64,
    counter: u64,
}

impl DeterministicRng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            stream_seed: seed,
            counter: 0,
        }
    }

    /// Independent stream for `label` derived from a parent seed.
    #[must_use]
    pub fn for_stream(seed: u64, label: &str) -> Self {
        Self::new(derive_stream_seed(seed, label))
    }

    #[must_use]
    pub const fn from_state(seed: u64, counter: u64) -> Self {
        Self {
            stream_seed: seed,
            counter,
        }
    }

    #[must_use]
    pub const fn state(self) -> (u64, u64) {
        (self.stream_seed, self.counter)
    }

    pub fn jump_ahead(&mut self, steps: u64) {
        self.counter = self.counter.wrapping_add(steps);
    }

    #[must_use]
    pub fn next_u64(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(1);
        splitmix64(
            self.stream_seed
                .wrapping_add(self.counter.wrapping_mul(GOLDEN_GAMMA)),
        )
    }

    /// Uniform in `[0, 1)` from the high 53 bits.
    #[must_use]
    pub fn next_f64(&mut self) -> f64 {
        let sample = self.next_u64() >> 11;
        sample as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `(0, 1]`.
    #[must_use]
    pub fn next_open_f64(&mut self) -> f64 {
        1.0 - self.next_f64()
    }

    pub fn bounded_u64(&mut self, upper_bound: u64) -> Result<u64, RandomError> {
        if upper_bound == 0 {
            return Err(RandomError::InvalidUpperBound);
        }

        let threshold = u64::MAX - u64::MAX % upper_bound;

        loop {
            let candidate = self.next_u64();
            if candidate < threshold {
                return Ok(candidate % upper_bound);
            }
        }
    }

    /// Box-Muller standard normal draw.
    #[must_use]
    pub fn standard_normal(&mut self) -> f64 {
        let u1 = self.next_open_f64();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    #[must_use]
    pub fn uniform_vec(&mut self, low: f64, high: f64, len: usize) -> Vec<f64> {
        (0..len).map(|_| low + (high - low) * self.next_f64()).collect()
    }

    #[must_use]
    pub fn normal_vec(&mut self, len: usize) -> Vec<f64> {
        (0..len).map(|_| self.standard_normal()).collect()
    }

    #[must_use]
    pub fn fill_u64(&mut self, len: usize) -> Vec<u64> {
        (0..len).map(|_| self.next_u64()).collect()
    }
}

/// `count` distinct values from `lo..hi`, in draw order.
pub fn sample_range(
    rng: &mut DeterministicRng,
    lo: usize,
    hi: usize,
    count: usize,
) -> Result<Vec<usize>, RandomError> {
    let width = hi.saturating_sub(lo);
    if width == 0 || count > width {
        return Err(RandomError::SampleLargerThanRange { lo, hi, count });
    }
    let mut pool: Vec<usize> = (lo..hi).collect();
    for i in 0..count {
        let remaining = (pool.len() - i) as u64;
        let j = i + rng.bounded_u64(remaining)? as usize;
        pool.swap(i, j);
    }
    pool.truncate(count);
    Ok(pool)
}

#[must_use]
pub fn derive_stream_seed(seed: u64, label: &str) -> u64 {
    let tag = label.bytes().fold(FNV_OFFSET, |acc, byte| {
        (acc ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    splitmix64(seed ^ splitmix64(tag))
}

fn splitmix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(MIX_CONST1);
    x ^= x >> 27;
    x = x.wrapping_mul(MIX_CONST2);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_FIXTURE_SEED, DeterministicRng, RANDOM_REASON_CODES, RandomError,
        derive_stream_seed, sample_range,
    };
    use std::collections::BTreeSet;

    #[test]
    fn same_seed_replays_same_stream() {
        let mut first = DeterministicRng::new(777);
        let mut second = DeterministicRng::new(777);
        assert_eq!(first.fill_u64(64), second.fill_u64(64));
    }

    #[test]
    fn state_restore_resumes_stream() {
        let mut rng = DeterministicRng::new(42);
        let _ = rng.fill_u64(5);
        let (seed, counter) = rng.state();
        let mut restored = DeterministicRng::from_state(seed, counter);
        assert_eq!(rng.next_u64(), restored.next_u64());
    }

    #[test]
    fn jump_ahead_skips_draws() {
        let mut stepped = DeterministicRng::new(9);
        let _ = stepped.fill_u64(3);
        let mut jumped = DeterministicRng::new(9);
        jumped.jump_ahead(3);
        assert_eq!(stepped.next_u64(), jumped.next_u64());
    }

    #[test]
    fn floats_stay_in_their_intervals() {
        let mut rng = DeterministicRng::new(DEFAULT_FIXTURE_SEED);
        for _ in 0..10_000 {
            let closed_open = rng.next_f64();
            assert!((0.0..1.0).contains(&closed_open));
            let open_closed = rng.next_open_f64();
            assert!(open_closed > 0.0 && open_closed <= 1.0);
        }
    }

    #[test]
    fn standard_normal_basic_stats() {
        let mut rng = DeterministicRng::new(1234);
        let vals = rng.normal_vec(10_000);
        let mean = vals.iter().sum::<f64>() / vals.len() as f64;
        let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / vals.len() as f64;
        assert!(mean.abs() < 0.05, "mean was {mean}");
        assert!((var - 1.0).abs() < 0.1, "variance was {var}");
    }

    #[test]
    fn reason_codes_are_unique_and_cover_variants() {
        let unique: BTreeSet<_> = RANDOM_REASON_CODES.iter().collect();
        assert_eq!(unique.len(), RANDOM_REASON_CODES.len());
        let errors = [
            RandomError::InvalidUpperBound,
            RandomError::SampleLargerThanRange {
                lo: 0,
                hi: 1,
                count: 2,
            },
        ];
        for err in errors {
            assert!(RANDOM_REASON_CODES.contains(&err.reason_code()));
        }
    }

    #[test]
    fn uniform_vec_respects_bounds() {
        let mut rng = DeterministicRng::new(DEFAULT_FIXTURE_SEED);
        let vals = rng.uniform_vec(-2.0, 3.0, 1_000);
        assert_eq!(vals.len(), 1_000);
        assert!(vals.iter().all(|v| (-2.0..3.0).contains(v)));
    }

    #[test]
    fn bounded_rejects_zero_upper_bound() {
        let mut rng = DeterministicRng::new(1);
        assert_eq!(rng.bounded_u64(0), Err(RandomError::InvalidUpperBound));
    }

    #[test]
    fn sample_range_draws_distinct_in_bounds_values() {
        for seed in 0..200 {
            let mut rng = DeterministicRng::new(seed);
            let drawn = sample_range(&mut rng, 1, 5, 2).expect("two of four");
            assert_eq!(drawn.len(), 2);
            assert!(drawn.iter().all(|v| (1..5).contains(v)));
            let unique: BTreeSet<_> = drawn.iter().collect();
            assert_eq!(unique.len(), 2);
        }
    }

    #[test]
    fn sample_range_full_width_is_a_permutation() {
        let mut rng = DeterministicRng::new(5);
        let mut drawn = sample_range(&mut rng, 1, 5, 4).expect("all four");
        drawn.sort_unstable();
        assert_eq!(drawn, vec![1, 2, 3, 4]);
    }

    #[test]
    fn sample_range_rejects_oversized_requests() {
        let mut rng = DeterministicRng::new(5);
        let err = sample_range(&mut rng, 2, 4, 3).expect_err("only two values available");
        assert_eq!(err.reason_code(), "random_sample_range_invalid");
        assert!(sample_range(&mut rng, 4, 2, 1).is_err());
    }

    #[test]
    fn stream_labels_decorrelate_streams() {
        assert_ne!(
            derive_stream_seed(DEFAULT_FIXTURE_SEED, "beta"),
            derive_stream_seed(DEFAULT_FIXTURE_SEED, "landmarks")
        );
        let mut a = DeterministicRng::for_stream(3, "x");
        let mut b = DeterministicRng::for_stream(3, "x");
        assert_eq!(a.next_u64(), b.next_u64());
    }
}
