use crate::core::Gate;
use crate::core::errors::StateError;
use crate::core::measurements::{Measurement, MeasurementResult};
use crate::core::utils::{self, c64, dagger, trace};
use ndarray::{Array1, Array2, array};
use num_complex::Complex64;
use rand::Rng;

/// Tolerance for the trace-1 and Hermiticity invariants.
pub const TOLERANCE: f64 = 1e-9;

/// Single-qubit density matrix.
///
/// Always 2x2, Hermitian, trace one. Every transform returns a new matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityMatrix {
    rho: Array2<Complex64>,
}

impl DensityMatrix {
    /// Wraps a matrix produced by a trace-preserving operation.
    pub(crate) fn from_trusted(rho: Array2<Complex64>) -> Self {
        debug_assert_eq!(rho.dim(), (2, 2));
        debug_assert!((trace(&rho) - c64(1.0, 0.0)).norm() < TOLERANCE);
        debug_assert!(utils::is_hermitian(&rho, TOLERANCE));
        Self { rho }
    }

    /// Checks the validity of a density matrix
    fn check_density_matrix(matrix: &Array2<Complex64>) -> Result<(), StateError> {
        let (rows, cols) = matrix.dim();

        if rows != 2 || cols != 2 {
            return Err(StateError::DimensionMismatch {
                expected: 2,
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

    /// Creates a state from a generic 2x2 density matrix.
    pub fn from_matrix(matrix: Array2<Complex64>) -> Result<Self, StateError> {
        Self::check_density_matrix(&matrix)?;
        Ok(Self { rho: matrix })
    }

    /// Creates the pure state $|\psi\rangle\langle\psi|$ from a normalized 2-vector.
    pub fn from_state_vector(vector: Array1<Complex64>) -> Result<Self, StateError> {
        if vector.len() != 2 {
            return Err(StateError::DimensionMismatch {
                expected: 2,
                got_rows: vector.len(),
                got_cols: 1,
            });
        }

        let norm_sqr: f64 = vector.iter().map(|c| c.norm_sqr()).sum();
        if (norm_sqr - 1.0).abs() > 1e-12 {
            return Err(StateError::NotNormalized(norm_sqr));
        }

        Ok(Self {
            rho: utils::outer_product(&vector, &vector),
        })
    }

    /// |0>
    pub fn zero() -> Self {
        Self::basis_state(0.0, false)
    }

    /// |1>
    pub fn one() -> Self {
        Self::basis_state(0.0, true)
    }

    /// |+>
    pub fn plus() -> Self {
        Self::basis_state(std::f64::consts::FRAC_PI_2, false)
    }

    /// |->
    pub fn minus() -> Self {
        Self::basis_state(std::f64::consts::FRAC_PI_2, true)
    }

    /// I/2
    pub fn maximally_mixed() -> Self {
        Self {
            rho: Array2::<Complex64>::eye(2).mapv(|x| x * 0.5),
        }
    }

    /// Eigenstate of the x-z plane measurement at Bloch angle `theta`:
    /// outcome `false` is the `+1` eigenstate, `true` the `-1` eigenstate.
    pub fn basis_state(theta: f64, outcome: bool) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        let v: Array1<Complex64> = if outcome {
            array![c64(-s, 0.0), c64(c, 0.0)]
        } else {
            array![c64(c, 0.0), c64(s, 0.0)]
        };
        Self {
            rho: utils::outer_product(&v, &v),
        }
    }

    /// $\rho = (I + xX + yY + zZ)/2$. Rejects vectors outside the unit ball.
    pub fn from_bloch(x: f64, y: f64, z: f64) -> Result<Self, StateError> {
        let r = (x * x + y * y + z * z).sqrt();
        if !r.is_finite() || r > 1.0 + TOLERANCE {
            return Err(StateError::OutsideBlochBall(r));
        }

        Ok(Self {
            rho: array![
                [c64((1.0 + z) / 2.0, 0.0), c64(x / 2.0, -y / 2.0)],
                [c64(x / 2.0, y / 2.0), c64((1.0 - z) / 2.0, 0.0)]
            ],
        })
    }

    /// Bloch vector `[x, y, z]`.
    pub fn bloch_vector(&self) -> [f64; 3] {
        let off = self.rho[[0, 1]];
        [
            2.0 * off.re,
            -2.0 * off.im,
            (self.rho[[0, 0]] - self.rho[[1, 1]]).re,
        ]
    }

    pub fn matrix(&self) -> &Array2<Complex64> {
        &self.rho
    }

    /// Entry $\rho_{rc}$.
    pub fn entry(&self, row: usize, col: usize) -> Complex64 {
        self.rho[[row, col]]
    }

    pub fn trace(&self) -> Complex64 {
        trace(&self.rho)
    }

    /// Checks if the state is still a valid density matrix.
    pub fn is_valid(&self) -> Result<(), StateError> {
        Self::check_density_matrix(&self.rho)
    }

    /// $\mathrm{Tr}(\rho^2)$
    pub fn purity(&self) -> f64 {
        trace(&self.rho.dot(&self.rho)).re
    }

    /// Uhlmann fidelity $\left(\mathrm{Tr}\sqrt{\sqrt\rho\,\sigma\sqrt\rho}\right)^2$.
    pub fn fidelity(&self, other: &DensityMatrix) -> f64 {
        let sqrt_rho = utils::sqrt_positive_matrix(&self.rho);
        let inner = sqrt_rho.dot(&other.rho).dot(&sqrt_rho);
        let tr = trace(&utils::sqrt_positive_matrix(&inner)).re;
        (tr * tr).clamp(0.0, 1.0)
    }

    /// $K\rho K^\dagger$ for a single operator, unnormalized.
    pub fn conjugate_by(&self, k: &Array2<Complex64>) -> Array2<Complex64> {
        k.dot(&self.rho).dot(&dagger(k))
    }

    /// $U\rho U^\dagger$
    pub fn apply_unitary(&self, gate: &Gate) -> DensityMatrix {
        DensityMatrix::from_trusted(self.conjugate_by(&gate.matrix))
    }

    /// $\sum_i K_i\rho K_i^\dagger$ for a complete Kraus set.
    pub fn apply_kraus(&self, ops: &[Array2<Complex64>]) -> DensityMatrix {
        let new_rho = ops
            .iter()
            .fold(Array2::<Complex64>::zeros((2, 2)), |acc, k| {
                acc + self.conjugate_by(k)
            });
        DensityMatrix::from_trusted(new_rho)
    }

    /// Born-rule probability of each outcome of `measurement`.
    pub fn probabilities(&self, measurement: &Measurement) -> Vec<f64> {
        let mut probs: Vec<f64> = measurement
            .operators
            .iter()
            .map(|op| trace(&self.conjugate_by(op)).re.max(0.0))
            .collect();

        // Due to float, renormalization of probabilities to ensure completeness
        let sum: f64 = probs.iter().sum();
        debug_assert!((sum - 1.0).abs() < 1e-6);
        for p in &mut probs {
            *p /= sum;
        }
        probs
    }

    /// Physical measurement: samples an outcome and returns it with the
    /// post-measurement state $M_k\rho M_k^\dagger / p_k$.
    pub fn measure<R: Rng + ?Sized>(
        &self,
        measurement: &Measurement,
        rng: &mut R,
    ) -> (MeasurementResult, DensityMatrix) {
        let probs = self.probabilities(measurement);
        let index = utils::sample_index(&probs, rng);
        let probability = probs[index];

        let numerator = self.conjugate_by(&measurement.operators[index]);
        let post = DensityMatrix::from_trusted(numerator.mapv(|v| v / probability));

        (MeasurementResult { index, probability }, post)
    }

    /// Measurement along Bloch angle `theta` in the x-z plane.
    pub fn measure_in_basis<R: Rng + ?Sized>(
        &self,
        theta: f64,
        rng: &mut R,
    ) -> (MeasurementResult, DensityMatrix) {
        self.measure(&Measurement::projective(theta), rng)
    }
}
