use crate::core::errors::GateError;
use crate::core::utils::{c64, dagger};
use ndarray::{Array2, arr2};
use num_complex::Complex64;

/// Represents a single-qubit unitary.
#[derive(Clone, Debug, PartialEq)]
pub struct Gate {
    /// The 2x2 unitary matrix of the gate.
    pub matrix: Array2<Complex64>,
}

impl Gate {
    /// Creates a new `Gate` from a unitary matrix.
    ///
    /// # Errors
    ///
    /// Returns a `GateError` if:
    /// - The matrix is not square.
    /// - The matrix is not 2x2.
    /// - The matrix is not unitary.
    pub fn new(matrix: Array2<Complex64>) -> Result<Self, GateError> {
        let (rows, cols) = matrix.dim();

        if rows != cols {
            return Err(GateError::NotSquareMatrix);
        }

        if rows != 2 {
            return Err(GateError::InvalidDimensions {
                expected: 2,
                rows,
                cols,
            });
        }

        if !Self::check_unitary(&matrix) {
            return Err(GateError::NonUnitary);
        }

        Ok(Self { matrix })
    }

    /// Checks if a given matrix is unitary
    fn check_unitary(matrix: &Array2<Complex64>) -> bool {
        let (rows, _) = matrix.dim();
        let eye = Array2::<Complex64>::eye(rows);

        let product = matrix.dot(&dagger(matrix));

        product
            .iter()
            .zip(eye.iter())
            .all(|(a, b)| (*a - *b).norm() < 1e-9)
    }

    /// Returns U†.
    pub fn adjoint(&self) -> Gate {
        Gate {
            matrix: dagger(&self.matrix),
        }
    }

    // --- Standard Gates ---

    /// Creates an Identity gate.
    pub fn i() -> Gate {
        Gate {
            matrix: Array2::eye(2),
        }
    }

    /// Creates a Pauli-X gate (NOT gate).
    pub fn x() -> Gate {
        Gate {
            matrix: arr2(&[[c64(0.0, 0.0), c64(1.0, 0.0)], [c64(1.0, 0.0), c64(0.0, 0.0)]]),
        }
    }

    /// Creates a Pauli-Y gate.
    pub fn y() -> Gate {
        Gate {
            matrix: arr2(&[[c64(0.0, 0.0), c64(0.0, -1.0)], [c64(0.0, 1.0), c64(0.0, 0.0)]]),
        }
    }

    /// Creates a Pauli-Z gate.
    pub fn z() -> Gate {
        Gate {
            matrix: arr2(&[[c64(1.0, 0.0), c64(0.0, 0.0)], [c64(0.0, 0.0), c64(-1.0, 0.0)]]),
        }
    }

    /// Creates a Hadamard gate.
    pub fn h() -> Gate {
        let f = 1.0 / 2.0_f64.sqrt();
        Gate {
            matrix: arr2(&[[c64(f, 0.0), c64(f, 0.0)], [c64(f, 0.0), c64(-f, 0.0)]]),
        }
    }

    /// Rotation about the Y axis of the Bloch sphere by `theta`.
    ///
    /// `ry(theta)|0>` is the `+1` eigenstate of the measurement at Bloch angle `theta`
    /// in the x-z plane.
    pub fn ry(theta: f64) -> Gate {
        let (s, c) = (theta / 2.0).sin_cos();
        Gate {
            matrix: arr2(&[[c64(c, 0.0), c64(-s, 0.0)], [c64(s, 0.0), c64(c, 0.0)]]),
        }
    }
}
