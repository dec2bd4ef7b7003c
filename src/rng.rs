//! Seeded random sources.
//!
//! Every stochastic function in the crate takes `&mut R where R: Rng + ?Sized`;
//! runs own a [`SimRng`] so a fixed seed replays the same sequence.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Generator used by simulation runs.
pub type SimRng = ChaCha20Rng;

/// Stream 0 of `seed`.
pub fn seeded(seed: u64) -> SimRng {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Independent stream `index` of the generator seeded with `seed`.
///
/// Sweeps give every run its own stream, so results do not depend on how
/// rayon schedules them.
pub fn stream(seed: u64, index: u64) -> SimRng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(index);
    rng
}

/// Seed drawn from the operating system when a configuration has none.
pub fn fresh_seed() -> u64 {
    rand::random()
}
