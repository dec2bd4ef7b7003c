//! Two-qubit density matrices for entanglement-based protocols.
//!
//! Basis ordering is $\{|00\rangle, |01\rangle, |10\rangle, |11\rangle\}$ with
//! subsystem A as the high bit.

use crate::core::errors::{ChannelError, StateError};
use crate::core::measurements::{Measurement, MeasurementResult};
use crate::core::state::{DensityMatrix, TOLERANCE};
use crate::core::utils::{self, c64, dagger, kronecker_product, trace};
use crate::core::validate_prob;
use ndarray::{Array1, Array2, array};
use num_complex::Complex64;
use rand::Rng;
use serde::Serialize;
use std::fmt;

/// The four maximally entangled two-qubit states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum BellState {
    /// (|00> + |11>)/√2
    #[default]
    PhiPlus,
    /// (|00> - |11>)/√2
    PhiMinus,
    /// (|01> + |10>)/√2
    PsiPlus,
    /// (|01> - |10>)/√2, the singlet
    PsiMinus,
}

impl BellState {
    pub fn amplitudes(self) -> Array1<Complex64> {
        let f = std::f64::consts::FRAC_1_SQRT_2;
        let z = c64(0.0, 0.0);
        match self {
            BellState::PhiPlus => array![c64(f, 0.0), z, z, c64(f, 0.0)],
            BellState::PhiMinus => array![c64(f, 0.0), z, z, c64(-f, 0.0)],
            BellState::PsiPlus => array![z, c64(f, 0.0), c64(f, 0.0), z],
            BellState::PsiMinus => array![z, c64(f, 0.0), c64(-f, 0.0), z],
        }
    }

    /// Sign `s` such that $\langle O_\alpha \otimes O_\beta\rangle = s\cos(\alpha-\beta)$ for
    /// x-z plane measurements, or `None` when the correlation depends on $\alpha+\beta$.
    pub fn correlation_sign(self) -> Option<f64> {
        match self {
            BellState::PhiPlus => Some(1.0),
            BellState::PsiMinus => Some(-1.0),
            BellState::PhiMinus | BellState::PsiPlus => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BellState::PhiPlus => "phi+",
            BellState::PhiMinus => "phi-",
            BellState::PsiPlus => "psi+",
            BellState::PsiMinus => "psi-",
        }
    }
}

impl fmt::Display for BellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which half of a bipartite system an operation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    A,
    B,
}

impl Subsystem {
    /// Lifts a single-qubit operator to the 4x4 space: `K ⊗ I` or `I ⊗ K`.
    pub fn lift(self, op: &Array2<Complex64>) -> Array2<Complex64> {
        let eye = Array2::<Complex64>::eye(2);
        match self {
            Subsystem::A => kronecker_product(op, &eye),
            Subsystem::B => kronecker_product(&eye, op),
        }
    }
}

/// Two-qubit density matrix (4x4, Hermitian, trace one).
#[derive(Clone, Debug, PartialEq)]
pub struct BipartiteDensityMatrix {
    rho: Array2<Complex64>,
}

impl BipartiteDensityMatrix {
    pub(crate) fn from_trusted(rho: Array2<Complex64>) -> Self {
        debug_assert_eq!(rho.dim(), (4, 4));
        debug_assert!((trace(&rho) - c64(1.0, 0.0)).norm() < TOLERANCE);
        debug_assert!(utils::is_hermitian(&rho, TOLERANCE));
        Self { rho }
    }

    fn check_density_matrix(matrix: &Array2<Complex64>) -> Result<(), StateError> {
        let (rows, cols) = matrix.dim();
        if rows != 4 || cols != 4 {
            return Err(StateError::DimensionMismatch {
                expected: 4,
                got_rows: rows,
                got_cols: cols,
            });
        }

        let tr = trace(matrix);
        if (tr - c64(1.0, 0.0)).norm() > TOLERANCE {
            return Err(StateError::InvalidTrace(tr));
        }

        if !utils::is_hermitian(matrix, TOLERANCE) {
            return Err(StateError::NotHermitian);
        }

        Ok(())
    }

    pub fn from_matrix(matrix: Array2<Complex64>) -> Result<Self, StateError> {
        Self::check_density_matrix(&matrix)?;
        Ok(Self { rho: matrix })
    }

    pub fn bell(state: BellState) -> Self {
        let v = state.amplitudes();
        Self {
            rho: utils::outer_product(&v, &v),
        }
    }

    /// I/4
    pub fn maximally_mixed() -> Self {
        Self {
            rho: Array2::<Complex64>::eye(4).mapv(|x| x * 0.25),
        }
    }

    /// $\rho_A \otimes \rho_B$
    pub fn product(a: &DensityMatrix, b: &DensityMatrix) -> Self {
        Self::from_trusted(kronecker_product(a.matrix(), b.matrix()))
    }

    /// Werner state $(1-p)\,|\beta\rangle\langle\beta| + p\,I/4$.
    pub fn werner(state: BellState, p: f64) -> Result<Self, ChannelError> {
        validate_prob(p)?;
        Ok(Self::bell(state).mix_with_white_noise(p))
    }

    /// $(1-p)\rho + p\,I/4$ for an already validated weight.
    pub(crate) fn mix_with_white_noise(&self, p: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&p));
        let noise = Array2::<Complex64>::eye(4).mapv(|x| x * (p / 4.0));
        Self::from_trusted(self.rho.mapv(|x| x * (1.0 - p)) + noise)
    }

    pub fn matrix(&self) -> &Array2<Complex64> {
        &self.rho
    }

    pub fn trace(&self) -> Complex64 {
        trace(&self.rho)
    }

    pub fn is_valid(&self) -> Result<(), StateError> {
        Self::check_density_matrix(&self.rho)
    }

    pub fn purity(&self) -> f64 {
        trace(&self.rho.dot(&self.rho)).re
    }

    /// Uhlmann fidelity; the 4x4 square roots go through a Hermitian eigendecomposition.
    pub fn fidelity(&self, other: &BipartiteDensityMatrix) -> f64 {
        let sqrt_rho = utils::sqrt_positive_matrix(&self.rho);
        let inner = sqrt_rho.dot(&other.rho).dot(&sqrt_rho);
        let tr = trace(&utils::sqrt_positive_matrix(&inner)).re;
        (tr * tr).clamp(0.0, 1.0)
    }

    /// Applies already lifted 4x4 Kraus operators.
    pub(crate) fn apply_lifted_kraus(&self, ops: &[Array2<Complex64>]) -> Self {
        let new_rho = ops
            .iter()
            .fold(Array2::<Complex64>::zeros((4, 4)), |acc, k| {
                acc + k.dot(&self.rho).dot(&dagger(k))
            });
        Self::from_trusted(new_rho)
    }

    /// Applies a single-qubit Kraus set to one half of the pair.
    pub fn apply_local_kraus(&self, subsystem: Subsystem, ops: &[Array2<Complex64>]) -> Self {
        let lifted: Vec<_> = ops.iter().map(|k| subsystem.lift(k)).collect();
        self.apply_lifted_kraus(&lifted)
    }

    /// Traces out `subsystem`, returning the state of the other half.
    pub fn partial_trace(&self, subsystem: Subsystem) -> DensityMatrix {
        let rho = &self.rho;
        let reduced = Array2::from_shape_fn((2, 2), |(i, j)| match subsystem {
            // keep B: sum over a of <a i| rho |a j>
            Subsystem::A => rho[[i, j]] + rho[[2 + i, 2 + j]],
            // keep A: sum over b of <i b| rho |j b>
            Subsystem::B => rho[[2 * i, 2 * j]] + rho[[2 * i + 1, 2 * j + 1]],
        });
        DensityMatrix::from_trusted(reduced)
    }

    /// State of `subsystem` alone.
    pub fn reduced_state(&self, subsystem: Subsystem) -> DensityMatrix {
        match subsystem {
            Subsystem::A => self.partial_trace(Subsystem::B),
            Subsystem::B => self.partial_trace(Subsystem::A),
        }
    }

    /// $\langle O_\alpha \otimes O_\beta \rangle$ for x-z plane observables.
    pub fn correlation(&self, alpha: f64, beta: f64) -> f64 {
        let obs = kronecker_product(
            &Measurement::observable(alpha),
            &Measurement::observable(beta),
        );
        trace(&self.rho.dot(&obs)).re
    }

    /// Measures one half along Bloch angle `theta`, returning the outcome and
    /// the collapsed two-qubit state.
    pub fn measure_subsystem<R: Rng + ?Sized>(
        &self,
        subsystem: Subsystem,
        theta: f64,
        rng: &mut R,
    ) -> (MeasurementResult, BipartiteDensityMatrix) {
        let lifted: Vec<_> = Measurement::projective(theta)
            .operators
            .iter()
            .map(|op| subsystem.lift(op))
            .collect();

        let unnormalized: Vec<_> = lifted
            .iter()
            .map(|m| m.dot(&self.rho).dot(&dagger(m)))
            .collect();
        let mut probs: Vec<f64> = unnormalized
            .iter()
            .map(|r| trace(r).re.max(0.0))
            .collect();
        let sum: f64 = probs.iter().sum();
        for p in &mut probs {
            *p /= sum;
        }

        let index = utils::sample_index(&probs, rng);
        let probability = probs[index];
        let post = Self::from_trusted(unnormalized[index].mapv(|v| v / probability));

        (MeasurementResult { index, probability }, post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::KrausChannel;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn bell_states_are_pure_with_mixed_marginals() {
        for b in [
            BellState::PhiPlus,
            BellState::PhiMinus,
            BellState::PsiPlus,
            BellState::PsiMinus,
        ] {
            let s = BipartiteDensityMatrix::bell(b);
            assert!(s.is_valid().is_ok());
            assert!((s.purity() - 1.0).abs() < 1e-9);
            for sub in [Subsystem::A, Subsystem::B] {
                let r = s.partial_trace(sub);
                assert!((r.purity() - 0.5).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn partial_trace_of_product_recovers_factors() {
        let s = BipartiteDensityMatrix::product(&DensityMatrix::zero(), &DensityMatrix::plus());
        let a = s.reduced_state(Subsystem::A);
        let b = s.reduced_state(Subsystem::B);
        assert!((a.fidelity(&DensityMatrix::zero()) - 1.0).abs() < 1e-9);
        assert!((b.fidelity(&DensityMatrix::plus()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn phi_plus_correlations_follow_angle_difference() {
        let s = BipartiteDensityMatrix::bell(BellState::PhiPlus);
        for (a, b) in [(0.0, FRAC_PI_4), (FRAC_PI_2, 3.0 * FRAC_PI_4), (0.3, 1.1)] {
            assert!((s.correlation(a, b) - (a - b).cos()).abs() < 1e-9);
        }
        let singlet = BipartiteDensityMatrix::bell(BellState::PsiMinus);
        assert!((singlet.correlation(0.0, PI / 3.0) + (PI / 3.0).cos()).abs() < 1e-9);
    }

    #[test]
    fn local_depolarizing_on_bell_gives_werner() {
        let p = 0.3;
        let channel = KrausChannel::depolarizing(p).unwrap();
        let noisy = BipartiteDensityMatrix::bell(BellState::PhiPlus)
            .apply_local_kraus(Subsystem::B, channel.kraus_operators());
        let werner = BipartiteDensityMatrix::werner(BellState::PhiPlus, p).unwrap();
        for (x, y) in noisy.matrix().iter().zip(werner.matrix().iter()) {
            assert!((x - y).norm() < 1e-9);
        }
        assert!((noisy.fidelity(&werner) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn subsystem_measurement_of_bell_pair_is_perfectly_correlated() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let pair = BipartiteDensityMatrix::bell(BellState::PhiPlus);
        for _ in 0..50 {
            let (ra, post) = pair.measure_subsystem(Subsystem::A, FRAC_PI_4, &mut rng);
            let (rb, _) = post.measure_subsystem(Subsystem::B, FRAC_PI_4, &mut rng);
            assert_eq!(ra.bit(), rb.bit());
        }
    }

    #[test]
    fn werner_rejects_bad_weight() {
        assert!(BipartiteDensityMatrix::werner(BellState::PhiPlus, 1.2).is_err());
    }
}
