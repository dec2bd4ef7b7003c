//! Syndrome-based reconciliation with a sparse random parity-check code.

use crate::core::utils::binary_entropy;
use rand::Rng;
use rand::seq::index;
use serde::Serialize;
use tracing::warn;

/// Checks each key bit takes part in.
pub const COLUMN_WEIGHT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LdpcResult {
    pub corrected: Vec<bool>,
    /// Syndrome length, the number of parity checks disclosed.
    pub bits_revealed: usize,
    pub code_rate: f64,
    pub iterations: usize,
    /// Checks still violated when decoding stopped.
    pub unsatisfied_checks: usize,
}

/// $R = 1 - f\,H_2(q)$, clamped to [0, 1].
pub fn code_rate(qber: f64, efficiency: f64) -> f64 {
    (1.0 - efficiency * binary_entropy(qber)).clamp(0.0, 1.0)
}

/// Sparse parity-check matrix stored both ways.
struct ParityCheck {
    rows: Vec<Vec<usize>>,
    cols: Vec<Vec<usize>>,
}

impl ParityCheck {
    fn random<R: Rng + ?Sized>(m: usize, n: usize, rng: &mut R) -> Self {
        let mut rows = vec![Vec::new(); m];
        let mut cols = Vec::with_capacity(n);
        let weight = COLUMN_WEIGHT.min(m);
        for j in 0..n {
            let checks = index::sample(rng, m, weight).into_vec();
            for &r in &checks {
                rows[r].push(j);
            }
            cols.push(checks);
        }
        Self { rows, cols }
    }

    fn syndrome(&self, bits: &[bool]) -> Vec<bool> {
        self.rows
            .iter()
            .map(|row| row.iter().fold(false, |acc, &j| acc ^ bits[j]))
            .collect()
    }
}

/// Reconciles Bob's key at the rate the estimated QBER calls for.
pub fn ldpc_reconcile<R: Rng + ?Sized>(
    alice: &[bool],
    bob: &[bool],
    qber: f64,
    efficiency: f64,
    rng: &mut R,
) -> LdpcResult {
    ldpc_with_rate(alice, bob, code_rate(qber, efficiency), rng)
}

/// Alice discloses the syndrome of a random column-weight-3 code of rate
/// `rate`; Bob runs hard-decision bit flipping, one bit per iteration.
pub fn ldpc_with_rate<R: Rng + ?Sized>(
    alice: &[bool],
    bob: &[bool],
    rate: f64,
    rng: &mut R,
) -> LdpcResult {
    debug_assert_eq!(alice.len(), bob.len());
    let n = alice.len();
    if n == 0 {
        return LdpcResult {
            corrected: Vec::new(),
            bits_revealed: 0,
            code_rate: rate,
            iterations: 0,
            unsatisfied_checks: 0,
        };
    }

    let m = ((n as f64) * (1.0 - rate)).ceil().max(1.0) as usize;
    let code = ParityCheck::random(m, n, rng);

    let target = code.syndrome(alice);
    let mut corrected = bob.to_vec();
    let mut unsatisfied: Vec<bool> = code
        .syndrome(&corrected)
        .iter()
        .zip(&target)
        .map(|(a, b)| a != b)
        .collect();

    let max_iterations = 2 * m + 16;
    let mut iterations = 0;
    while iterations < max_iterations && unsatisfied.contains(&true) {
        // bit sitting in the most violated checks, lowest index on ties
        let (best, votes) = code
            .cols
            .iter()
            .map(|checks| checks.iter().filter(|&&r| unsatisfied[r]).count())
            .enumerate()
            .fold((0, 0), |(bi, bv), (j, v)| if v > bv { (j, v) } else { (bi, bv) });
        if votes == 0 {
            break;
        }
        corrected[best] = !corrected[best];
        for &r in &code.cols[best] {
            unsatisfied[r] = !unsatisfied[r];
        }
        iterations += 1;
    }

    let unsatisfied_checks = unsatisfied.iter().filter(|&&u| u).count();
    if unsatisfied_checks > 0 {
        warn!(
            n,
            m, unsatisfied_checks, iterations, "LDPC decoding stopped with violated checks"
        );
    }

    LdpcResult {
        corrected,
        bits_revealed: m,
        code_rate: rate,
        iterations,
        unsatisfied_checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn single_error_is_decoded() {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let alice: Vec<bool> = (0..256).map(|_| rng.random_bool(0.5)).collect();
        let mut bob = alice.clone();
        bob[100] = !bob[100];
        let res = ldpc_with_rate(&alice, &bob, 0.5, &mut rng);
        assert_eq!(res.bits_revealed, 128);
        assert_eq!(res.unsatisfied_checks, 0);
        assert_eq!(res.corrected, alice);
    }

    #[test]
    fn rate_follows_entropy() {
        assert!((code_rate(0.0, 1.16) - 1.0).abs() < 1e-12);
        assert!((code_rate(0.11, 1.0) - (1.0 - binary_entropy(0.11))).abs() < 1e-12);
        assert_eq!(code_rate(0.5, 1.16), 0.0);
    }

    #[test]
    fn perfect_agreement_reveals_one_check_minimum() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let key = vec![true, false, true, true];
        let res = ldpc_with_rate(&key, &key, 1.0, &mut rng);
        assert_eq!(res.bits_revealed, 1);
        assert_eq!(res.iterations, 0);
    }
}
