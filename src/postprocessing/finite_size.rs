use crate::core::utils::binary_entropy;
use serde::Serialize;

/// Secure key length bound for a finite block of `n` bits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiniteSizeAnalysis {
    pub n: usize,
    pub epsilon: f64,
    /// $\sqrt{\ln(1/\varepsilon)/(2n)}$
    pub statistical_fluctuation: f64,
    /// Measured QBER plus the fluctuation, capped at 1/2.
    pub conservative_qber: f64,
    pub secure_key_length: usize,
    pub key_fraction: f64,
}

/// $l = \lfloor n(1 - H_2(q_c)) - f\,n\,H_2(q_c) - 2\log_2(1/\varepsilon) \rfloor$, floored at 0.
pub fn finite_size_analysis(
    n: usize,
    qber: f64,
    reconciliation_efficiency: f64,
    epsilon: f64,
) -> FiniteSizeAnalysis {
    if n == 0 {
        return FiniteSizeAnalysis {
            n,
            epsilon,
            statistical_fluctuation: 0.0,
            conservative_qber: 0.0,
            secure_key_length: 0,
            key_fraction: 0.0,
        };
    }

    let nf = n as f64;
    let statistical_fluctuation = ((1.0 / epsilon).ln() / (2.0 * nf)).sqrt();
    let conservative_qber = (qber + statistical_fluctuation).min(0.5);
    let h = binary_entropy(conservative_qber);
    let raw = nf * (1.0 - h) - reconciliation_efficiency * nf * h - 2.0 * (1.0 / epsilon).log2();
    let secure_key_length = raw.floor().max(0.0) as usize;

    FiniteSizeAnalysis {
        n,
        epsilon,
        statistical_fluctuation,
        conservative_qber,
        secure_key_length,
        key_fraction: secure_key_length as f64 / nf,
    }
}
