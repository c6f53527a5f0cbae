//! Deterministic seed derivation.
//!
//! Every random stream in a comparison is derived from the base seed, so two
//! runs with the same inputs replay the same draws and concurrent trials never
//! share a generator.

use rand::rngs::StdRng;
use rand::SeedableRng;

const REPETITION_SALT: u64 = 0x5245_5045_5449_5449;

/// Independent concerns that each get their own stream within a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Stream {
    Arms = 1,
    RewardNoise = 2,
    Context = 3,
    Policy = 4,
}

#[inline]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for repetition `r` of a comparison. Identical for every policy.
pub fn repetition_seed(base_seed: u64, repetition: usize) -> u64 {
    splitmix64(base_seed ^ splitmix64(REPETITION_SALT.wrapping_add(repetition as u64)))
}

pub fn stream_seed(seed: u64, stream: Stream) -> u64 {
    splitmix64(seed ^ splitmix64(stream as u64))
}

pub fn stream_rng(seed: u64, stream: Stream) -> StdRng {
    StdRng::seed_from_u64(stream_seed(seed, stream))
}
