use rand::Rng;
use rand::seq::index;
use serde::Serialize;

/// QBER measured on a random sample that is then discarded from the key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QberEstimate {
    pub sample_size: usize,
    pub sample_errors: usize,
    pub qber: f64,
    /// Alice's bits left after removing the sample.
    #[serde(skip)]
    pub alice_remaining: Vec<bool>,
    #[serde(skip)]
    pub bob_remaining: Vec<bool>,
}

/// Publicly compares `round(n * sample_fraction)` random positions.
///
/// A zero-size sample reports QBER 0 and keeps every bit.
pub fn estimate_qber<R: Rng + ?Sized>(
    alice: &[bool],
    bob: &[bool],
    sample_fraction: f64,
    rng: &mut R,
) -> QberEstimate {
    debug_assert_eq!(alice.len(), bob.len());
    let n = alice.len();
    let sample_size = ((n as f64) * sample_fraction).round().clamp(0.0, n as f64) as usize;

    let mut sampled = vec![false; n];
    for i in index::sample(rng, n, sample_size) {
        sampled[i] = true;
    }

    let mut sample_errors = 0;
    let mut alice_remaining = Vec::with_capacity(n - sample_size);
    let mut bob_remaining = Vec::with_capacity(n - sample_size);
    for i in 0..n {
        if sampled[i] {
            if alice[i] != bob[i] {
                sample_errors += 1;
            }
        } else {
            alice_remaining.push(alice[i]);
            bob_remaining.push(bob[i]);
        }
    }

    let qber = if sample_size > 0 {
        sample_errors as f64 / sample_size as f64
    } else {
        0.0
    };

    QberEstimate {
        sample_size,
        sample_errors,
        qber,
        alice_remaining,
        bob_remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn sample_is_removed_from_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let alice = vec![true; 100];
        let bob = vec![true; 100];
        let est = estimate_qber(&alice, &bob, 0.2, &mut rng);
        assert_eq!(est.sample_size, 20);
        assert_eq!(est.alice_remaining.len(), 80);
        assert_eq!(est.qber, 0.0);
    }

    #[test]
    fn all_errors_gives_qber_one() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let alice = vec![true; 50];
        let bob = vec![false; 50];
        let est = estimate_qber(&alice, &bob, 0.5, &mut rng);
        assert_eq!(est.sample_errors, 25);
        assert!((est.qber - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_key_has_empty_sample() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let est = estimate_qber(&[], &[], 0.2, &mut rng);
        assert_eq!(est.sample_size, 0);
        assert_eq!(est.qber, 0.0);
    }
}
