use crate::core::errors::MeasurementError;
use crate::core::utils::{self, c64};
use ndarray::{Array1, Array2, array};
use num_complex::Complex64;
use serde::Serialize;

/// A single-qubit measurement given by its measurement operators $M_k$.
#[derive(Clone, Debug)]
pub struct Measurement {
    /// List of measurement operators
    pub operators: Vec<Array2<Complex64>>,
}

impl Measurement {
    pub fn new(operators: Vec<Array2<Complex64>>) -> Result<Self, MeasurementError> {
        if operators.is_empty() {
            return Err(MeasurementError::Empty);
        }

        if operators.iter().any(|op| op.dim() != (2, 2)) {
            return Err(MeasurementError::InvalidDimensions);
        }

        if !utils::check_completeness(&operators, 2) {
            return Err(MeasurementError::NotComplete);
        }

        Ok(Self { operators })
    }

    /// Projective measurement along the Bloch direction at angle `theta` in the x-z plane.
    ///
    /// Outcome 0 projects onto $\cos(\theta/2)|0\rangle + \sin(\theta/2)|1\rangle$,
    /// outcome 1 onto the orthogonal state.
    pub fn projective(theta: f64) -> Measurement {
        let (s, c) = (theta / 2.0).sin_cos();

        let v0: Array1<Complex64> = array![c64(c, 0.0), c64(s, 0.0)];
        let v1: Array1<Complex64> = array![c64(-s, 0.0), c64(c, 0.0)];

        Measurement {
            operators: vec![
                utils::outer_product(&v0, &v0),
                utils::outer_product(&v1, &v1),
            ],
        }
    }

    /// Z basis (Computational) -> {|0>, |1>}.
    pub fn z_basis() -> Measurement {
        Self::projective(0.0)
    }

    /// X basis (Hadamard) -> {|+>, |->}.
    pub fn x_basis() -> Measurement {
        Self::projective(std::f64::consts::FRAC_PI_2)
    }

    /// The observable $O_\theta = M_0 - M_1 = \cos\theta\,Z + \sin\theta\,X$.
    pub fn observable(theta: f64) -> Array2<Complex64> {
        let m = Self::projective(theta);
        &m.operators[0] - &m.operators[1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasurementResult {
    /// Applied measurement operator index
    pub index: usize,
    /// Born-rule probability of that outcome
    pub probability: f64,
}

impl MeasurementResult {
    /// Outcome as a key bit (`index != 0`).
    pub fn bit(&self) -> bool {
        self.index != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projective_bases_are_complete() {
        for theta in [0.0, 0.4, std::f64::consts::FRAC_PI_2, 2.3] {
            let m = Measurement::projective(theta);
            assert!(Measurement::new(m.operators).is_ok());
        }
    }

    #[test]
    fn rejects_incomplete_operators() {
        let m = Measurement::z_basis();
        let partial = vec![m.operators[0].clone()];
        assert!(matches!(
            Measurement::new(partial),
            Err(MeasurementError::NotComplete)
        ));
    }

    #[test]
    fn observable_at_zero_is_pauli_z() {
        let o = Measurement::observable(0.0);
        assert!((o[[0, 0]] - c64(1.0, 0.0)).norm() < 1e-12);
        assert!((o[[1, 1]] - c64(-1.0, 0.0)).norm() < 1e-12);
        assert!(o[[0, 1]].norm() < 1e-12);
    }
}
