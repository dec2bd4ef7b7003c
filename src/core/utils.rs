//! Utility functions for quantum operations.
//!
//! This module contains helper functions for:
//! - Matrix operations (Kronecker product, trace, adjoint, outer product, square root).
//! - Completeness checks for Kraus sets and measurements.
//! - Probability helpers shared by the stochastic parts of the simulation.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::Rng;

/// Shorthand constructor for a complex number.
#[inline]
pub fn c64(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// Computes the Kronecker (Tensor) product of two matrices.
///
/// If `A` is an $m \times n$ matrix and `B` is a $p \times q$ matrix,
/// the result is an $mp \times nq$ matrix.
pub fn kronecker_product(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Array2<Complex64> {
    let (p, q) = b.dim();
    let (m, n) = a.dim();

    Array2::from_shape_fn((m * p, n * q), |(row, col)| {
        a[[row / p, col / q]] * b[[row % p, col % q]]
    })
}

/// Computes the trace of a matrix (sum of diagonal elements).
pub fn trace(matrix: &Array2<Complex64>) -> Complex64 {
    matrix.diag().sum()
}

/// Conjugate transpose $M^\dagger$.
pub fn dagger(matrix: &Array2<Complex64>) -> Array2<Complex64> {
    matrix.t().mapv(|c| c.conj())
}

/// Checks completeness relation for Kraus or measurement operators.
///
/// Verifies if $\sum K_k^\dagger K_k = I$.
pub fn check_completeness(ops: &[Array2<Complex64>], dim: usize) -> bool {
    let eye = Array2::<Complex64>::eye(dim);
    let sum = ops
        .iter()
        .fold(Array2::<Complex64>::zeros((dim, dim)), |acc, op| {
            acc + dagger(op).dot(op)
        });
    sum.iter()
        .zip(eye.iter())
        .all(|(a, b)| (a - b).norm() < 1e-9)
}

/// Computes the outer product of two vectors $|a\rangle\langle b|$.
pub fn outer_product(a: &Array1<Complex64>, b: &Array1<Complex64>) -> Array2<Complex64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j].conj())
}

/// Finds the square root of a positive semi-definite matrix.
///
/// Uses spectral decomposition $M = V D V^\dagger$ to compute $\sqrt{M} = V \sqrt{D} V^\dagger$.
pub fn sqrt_positive_matrix(mat: &Array2<Complex64>) -> Array2<Complex64> {
    let (rows, cols) = mat.dim();

    // Optimized case for 2x2 matrix
    if rows == 2 && cols == 2 {
        return sqrt_2x2_analytical(mat);
    }

    sqrt_nxn_nalgebra(mat)
}

/// Direct formula for the square root of a 2x2 matrix
/// sqrt(A) = (A + sqrt(det)I) / sqrt(tr + 2sqrt(det))
fn sqrt_2x2_analytical(mat: &Array2<Complex64>) -> Array2<Complex64> {
    let tr = mat[[0, 0]] + mat[[1, 1]];
    let det = mat[[0, 0]] * mat[[1, 1]] - mat[[0, 1]] * mat[[1, 0]];

    let clean_det = if det.norm() < 1e-12 {
        Complex64::new(0.0, 0.0)
    } else {
        det
    };
    let sqrt_det = clean_det.sqrt();

    let s = (tr + Complex64::new(2.0, 0.0) * sqrt_det).sqrt();

    if s.norm() < 1e-12 {
        return Array2::zeros((2, 2));
    }

    let factor = Complex64::new(1.0, 0.0) / s;
    let identity = Array2::<Complex64>::eye(2);

    let numerator = mat + &identity.mapv(|x| x * sqrt_det);
    numerator.mapv(|x| x * factor)
}

/// General Hermitian case using nalgebra
fn sqrt_nxn_nalgebra(mat: &Array2<Complex64>) -> Array2<Complex64> {
    let (rows, cols) = mat.dim();

    let na_mat = DMatrix::from_fn(rows, cols, |r, c| mat[[r, c]]);
    let eigen = na_mat.symmetric_eigen();

    // sqrt(D), clipping round-off negatives
    let mut sqrt_eigenvals = DMatrix::<Complex64>::zeros(rows, rows);
    for i in 0..rows {
        let val = eigen.eigenvalues[i].max(0.0);
        sqrt_eigenvals[(i, i)] = Complex64::new(val.sqrt(), 0.0);
    }

    let v = &eigen.eigenvectors;
    let result_na = v * sqrt_eigenvals * v.adjoint();

    Array2::from_shape_fn((rows, cols), |(r, c)| result_na[(r, c)])
}

/// Checks if a matrix is Hermitian
pub fn is_hermitian(mat: &Array2<Complex64>, tol: f64) -> bool {
    mat.iter()
        .zip(mat.t().iter())
        .all(|(a, b)| (a - b.conj()).norm() < tol)
}

/// Binary Shannon entropy $H_2(p) = -p\log_2 p - (1-p)\log_2(1-p)$, with $H_2(0) = H_2(1) = 0$.
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -p * p.log2() - (1.0 - p) * (1.0 - p).log2()
}

/// Clamps a derived probability into [0, 1]. NaN collapses to 0.
#[inline]
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Bernoulli trial on a clamped probability.
#[inline]
pub fn bernoulli<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    let p = clamp_probability(p);
    if p <= 0.0 {
        return false;
    }
    rng.random_bool(p)
}

/// Randomly selects an outcome index weighted by `probs`.
///
/// Zero-probability outcomes are never returned, even when round-off leaves
/// the roll above the final cumulative sum.
pub fn sample_index<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> usize {
    let roll: f64 = rng.random();

    let mut cumulative = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p;
        if p > 0.0 && roll < cumulative {
            return i;
        }
    }
    probs
        .iter()
        .rposition(|&p| p > 0.0)
        .unwrap_or(probs.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn binary_entropy_endpoints() {
        assert_eq!(binary_entropy(0.0), 0.0);
        assert_eq!(binary_entropy(1.0), 0.0);
        assert!((binary_entropy(0.5) - 1.0).abs() < 1e-15);
        assert!((binary_entropy(0.11) - binary_entropy(0.89)).abs() < 1e-12);
    }

    #[test]
    fn kronecker_of_paulis_places_blocks() {
        let x = array![[c64(0.0, 0.0), c64(1.0, 0.0)], [c64(1.0, 0.0), c64(0.0, 0.0)]];
        let eye = Array2::<Complex64>::eye(2);
        let k = kronecker_product(&x, &eye);

        assert_eq!(k.dim(), (4, 4));
        assert_eq!(k[[0, 2]], c64(1.0, 0.0));
        assert_eq!(k[[1, 3]], c64(1.0, 0.0));
        assert_eq!(k[[0, 1]], c64(0.0, 0.0));
    }

    #[test]
    fn sqrt_of_projector_is_itself() {
        let half = c64(0.5, 0.0);
        let p_plus = array![[half, half], [half, half]];
        let root = sqrt_positive_matrix(&p_plus);
        for (a, b) in root.iter().zip(p_plus.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn sqrt_4x4_squares_back() {
        let mut m = Array2::<Complex64>::eye(4).mapv(|x| x * 0.25);
        m[[0, 3]] = c64(0.1, 0.0);
        m[[3, 0]] = c64(0.1, 0.0);
        let root = sqrt_positive_matrix(&m);
        let squared = root.dot(&root);
        for (a, b) in squared.iter().zip(m.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn sample_index_skips_zero_weight_outcomes() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..1000 {
            assert_eq!(sample_index(&[0.0, 1.0, 0.0], &mut rng), 1);
        }
    }

    #[test]
    fn clamp_handles_nan_and_overflow() {
        assert_eq!(clamp_probability(f64::NAN), 0.0);
        assert_eq!(clamp_probability(1.5), 1.0);
        assert_eq!(clamp_probability(-0.1), 0.0);
    }
}
