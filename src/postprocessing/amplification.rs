//! Privacy amplification by two-universal hashing.
//!
//! Every hash is a linear map over GF(2) selected by a public seed, so Alice
//! and Bob compress their keys independently and agree whenever their inputs
//! agree.

use crate::core::utils::binary_entropy;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum HashMethod {
    /// Toeplitz matrix from `n + l - 1` seed bits.
    #[default]
    Toeplitz,
    /// Fully random `l x n` binary matrix.
    RandomMatrix,
    /// Seeded permutation folded down to `l` bits by XOR.
    Universal,
}

/// $l = n - \lceil f_E\,n \rceil - s$, or 0 when that is not positive.
pub fn final_key_length(n: usize, eve_fraction: f64, security_bits: usize) -> usize {
    let leaked = ((eve_fraction.clamp(0.0, 1.0) * n as f64) - 1e-9).ceil().max(0.0) as usize;
    n.saturating_sub(leaked).saturating_sub(security_bits)
}

/// Eve's information per key bit: $H_2(q)$ plus the reconciliation leakage, capped at 1.
pub fn eve_information_fraction(qber: f64, bits_revealed: usize, n: usize) -> f64 {
    if n == 0 {
        return 1.0;
    }
    (binary_entropy(qber) + bits_revealed as f64 / n as f64).min(1.0)
}

pub fn amplify(key: &[bool], output_len: usize, method: HashMethod, seed: u64) -> Vec<bool> {
    match method {
        HashMethod::Toeplitz => toeplitz_hash(key, output_len, seed),
        HashMethod::RandomMatrix => random_matrix_hash(key, output_len, seed),
        HashMethod::Universal => universal_hash(key, output_len, seed),
    }
}

/// $y_i = \bigoplus_j T_{ij} x_j$ with $T_{ij} = s_{i - j + n - 1}$.
pub fn toeplitz_hash(key: &[bool], output_len: usize, seed: u64) -> Vec<bool> {
    let n = key.len();
    if n == 0 || output_len == 0 {
        return vec![false; output_len];
    }
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let diagonal: Vec<bool> = (0..n + output_len - 1)
        .map(|_| rng.random_bool(0.5))
        .collect();

    (0..output_len)
        .map(|i| {
            key.iter()
                .enumerate()
                .filter(|&(_, &x)| x)
                .fold(false, |acc, (j, _)| acc ^ diagonal[i + n - 1 - j])
        })
        .collect()
}

pub fn random_matrix_hash(key: &[bool], output_len: usize, seed: u64) -> Vec<bool> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..output_len)
        .map(|_| {
            key.iter()
                .fold(false, |acc, &x| acc ^ (x & rng.random_bool(0.5)))
        })
        .collect()
}

pub fn universal_hash(key: &[bool], output_len: usize, seed: u64) -> Vec<bool> {
    let mut out = vec![false; output_len];
    if output_len == 0 {
        return out;
    }
    let mut order: Vec<usize> = (0..key.len()).collect();
    order.shuffle(&mut ChaCha20Rng::seed_from_u64(seed));
    for (k, &src) in order.iter().enumerate() {
        out[k % output_len] ^= key[src];
    }
    out
}

/// Packs bits MSB first; a trailing partial byte is zero padded.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &b)| byte | ((b as u8) << (7 - i)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor(a: &[bool], b: &[bool]) -> Vec<bool> {
        a.iter().zip(b).map(|(x, y)| x ^ y).collect()
    }

    #[test]
    fn key_length_arithmetic() {
        assert_eq!(final_key_length(1000, 0.2, 128), 672);
        assert_eq!(final_key_length(100, 0.9, 128), 0);
        assert_eq!(final_key_length(0, 0.0, 0), 0);
    }

    #[test]
    fn hashes_are_linear_and_deterministic() {
        let a: Vec<bool> = (0..97).map(|i| i % 3 == 0).collect();
        let b: Vec<bool> = (0..97).map(|i| i % 5 == 1).collect();
        for method in [HashMethod::Toeplitz, HashMethod::RandomMatrix, HashMethod::Universal] {
            let ha = amplify(&a, 40, method, 7);
            let hb = amplify(&b, 40, method, 7);
            let hab = amplify(&xor(&a, &b), 40, method, 7);
            assert_eq!(ha.len(), 40);
            assert_eq!(xor(&ha, &hb), hab);
            assert_eq!(ha, amplify(&a, 40, method, 7));
        }
    }

    #[test]
    fn toeplitz_matches_explicit_matrix() {
        let key = vec![true, false, true, true, false];
        let l = 3;
        let out = toeplitz_hash(&key, l, 5);
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let s: Vec<bool> = (0..key.len() + l - 1).map(|_| rng.random_bool(0.5)).collect();
        for i in 0..l {
            let mut bit = false;
            for j in 0..key.len() {
                bit ^= s[i + key.len() - 1 - j] & key[j];
            }
            assert_eq!(out[i], bit);
        }
    }

    #[test]
    fn eve_fraction_is_capped() {
        assert_eq!(eve_information_fraction(0.5, 10, 10), 1.0);
        assert_eq!(eve_information_fraction(0.0, 0, 0), 1.0);
        assert!((eve_information_fraction(0.0, 25, 100) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn packs_msb_first() {
        let bits = [true, false, false, false, false, false, false, true, true];
        assert_eq!(pack_bits(&bits), vec![0x81, 0x80]);
    }
}
