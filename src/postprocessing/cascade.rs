//! Cascade interactive error correction.
//!
//! Both parties' bits live in one process. Every parity Alice discloses is
//! counted in `bits_revealed`.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

/// Default number of Cascade passes.
pub const DEFAULT_PASSES: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeResult {
    /// Bob's key after correction.
    pub corrected: Vec<bool>,
    pub bits_revealed: usize,
    pub errors_corrected: usize,
    pub passes: usize,
    pub initial_block_size: usize,
}

/// First-pass block size, about `0.73 / qber` and never below 2.
/// QBER 0 uses one block over the whole key.
pub fn initial_block_size(qber: f64, n: usize) -> usize {
    if qber <= 0.0 {
        return n.max(2);
    }
    ((0.73 / qber).round() as usize).max(2)
}

/// $\lceil \log_2 n \rceil$ for `n >= 1`.
fn ceil_log2(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}

fn parity(bits: &[bool], perm: &[usize]) -> bool {
    perm.iter().fold(false, |acc, &i| acc ^ bits[i])
}

/// Runs Cascade with the block size derived from `qber`.
pub fn cascade<R: Rng + ?Sized>(
    alice: &[bool],
    bob: &[bool],
    qber: f64,
    passes: usize,
    rng: &mut R,
) -> CascadeResult {
    cascade_with_block_size(alice, bob, initial_block_size(qber, alice.len()), passes, rng)
}

/// Runs Cascade starting from `block_size`, doubling it every pass.
///
/// Each pass compares the parity of every block of the permuted key. A
/// mismatching block is bisected over index ranges of the permutation until
/// the single differing bit is found and flipped in Bob's key.
pub fn cascade_with_block_size<R: Rng + ?Sized>(
    alice: &[bool],
    bob: &[bool],
    block_size: usize,
    passes: usize,
    rng: &mut R,
) -> CascadeResult {
    debug_assert_eq!(alice.len(), bob.len());
    let n = alice.len();
    let mut corrected = bob.to_vec();
    let mut perm: Vec<usize> = (0..n).collect();
    let mut bits_revealed = 0;
    let mut errors_corrected = 0;
    let block_size = block_size.max(2);

    if n == 0 {
        return CascadeResult {
            corrected,
            bits_revealed,
            errors_corrected,
            passes: 0,
            initial_block_size: block_size,
        };
    }

    for pass in 0..passes {
        let block = block_size.saturating_mul(1 << pass.min(30)).min(n).max(1);

        for chunk in perm.chunks(block) {
            bits_revealed += 1;
            if parity(alice, chunk) == parity(&corrected, chunk) {
                continue;
            }

            // bisect [lo, hi) until one position remains
            let (mut lo, mut hi) = (0, chunk.len());
            while hi - lo > 1 {
                let mid = lo + (hi - lo) / 2;
                if parity(alice, &chunk[lo..mid]) != parity(&corrected, &chunk[lo..mid]) {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }
            bits_revealed += ceil_log2(chunk.len());
            let pos = chunk[lo];
            corrected[pos] = !corrected[pos];
            errors_corrected += 1;
        }

        perm.shuffle(rng);
    }

    CascadeResult {
        corrected,
        bits_revealed,
        errors_corrected,
        passes,
        initial_block_size: block_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn random_key(n: usize, rng: &mut ChaCha20Rng) -> Vec<bool> {
        (0..n).map(|_| rng.random_bool(0.5)).collect()
    }

    #[test]
    fn single_error_fixed_in_one_pass() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let alice = random_key(64, &mut rng);
        for err in [0, 17, 63] {
            let mut bob = alice.clone();
            bob[err] = !bob[err];
            let res = cascade_with_block_size(&alice, &bob, 8, 1, &mut rng);
            assert_eq!(res.corrected, alice);
            assert_eq!(res.errors_corrected, 1);
            // 8 block parities + log2(8) bisection parities
            assert_eq!(res.bits_revealed, 8 + 3);
        }
    }

    #[test]
    fn multiple_sparse_errors_are_corrected() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let alice = random_key(2000, &mut rng);
        let mut bob = alice.clone();
        for i in (0..2000).step_by(97) {
            bob[i] = !bob[i];
        }
        let qber = 21.0 / 2000.0;
        let res = cascade(&alice, &bob, qber, DEFAULT_PASSES, &mut rng);
        let residual = res
            .corrected
            .iter()
            .zip(&alice)
            .filter(|(a, b)| a != b)
            .count();
        assert!(residual <= 2);
    }

    #[test]
    fn block_size_rules() {
        assert_eq!(initial_block_size(0.0, 100), 100);
        assert_eq!(initial_block_size(0.5, 100), 2);
        assert_eq!(initial_block_size(0.073, 100), 10);
    }

    #[test]
    fn ceil_log2_values() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(8), 3);
    }

    #[test]
    fn identical_keys_reveal_only_block_parities() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let alice = random_key(32, &mut rng);
        let res = cascade_with_block_size(&alice, &alice, 4, 2, &mut rng);
        assert_eq!(res.errors_corrected, 0);
        // 8 blocks of 4, then 4 blocks of 8
        assert_eq!(res.bits_revealed, 12);
    }
}
