use num_complex::Complex64;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    #[error("Matrix is not Unitary (U†U != I)")]
    NonUnitary,

    #[error("Matrix must be square")]
    NotSquareMatrix,

    #[error("Invalid Dimensions: expected {expected}x{expected}, got {rows}x{cols}")]
    InvalidDimensions {
        expected: usize,
        rows: usize,
        cols: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    #[error("Measurement must have at least one operator")]
    Empty,

    #[error("Measurement operators do not sum to Identity (Completeness relation failed)")]
    NotComplete,

    #[error("Invalid operator dimensions")]
    InvalidDimensions,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Trace is not unity: {0}")]
    InvalidTrace(Complex64),

    #[error("Matrix is not Hermitian")]
    NotHermitian,

    #[error("Vector is not normalized. Norm squared: {0}")]
    NotNormalized(f64),

    #[error("Bloch vector lies outside the unit ball: |r| = {0}")]
    OutsideBlochBall(f64),

    #[error("Dimension mismatch: expected {expected}x{expected}, got {got_rows}x{got_cols}")]
    DimensionMismatch {
        expected: usize,
        got_rows: usize,
        got_cols: usize,
    },

    #[error("Measurement error: {0}")]
    MeasurementError(#[from] MeasurementError),

    #[error("Gate error: {0}")]
    GateError(#[from] GateError),

    #[error("Channel error: {0}")]
    ChannelError(#[from] ChannelError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Channel must have at least one Kraus operator")]
    Empty,

    #[error("Kraus operators do not sum to Identity (Trace preserving relation failed)")]
    NotComplete,

    #[error("Invalid operator dimensions: single-qubit Kraus operators must be 2x2")]
    InvalidDimensions,

    #[error("Invalid probability: {0}. Must be between 0.0 and 1.0")]
    InvalidProbability(f64),
}

/// Rejected configuration value. Raised when a configuration is built, never
/// during a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {parameter}: {value} (expected {expected})")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("Invalid {parameter}: {value} (expected {expected})")]
    InvalidCount {
        parameter: &'static str,
        value: usize,
        expected: &'static str,
    },

    #[error("Bell state {0} has no equal-angle correlations in the x-z measurement plane")]
    UnsupportedBellState(&'static str),
}

/// Crate-level error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QkdError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}
