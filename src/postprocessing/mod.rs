//! Classical post-processing of a sifted key.
//!
//! Pipeline: QBER sampling, error correction (Cascade or LDPC), privacy
//! amplification, plus a finite-size security estimate. Only classical bits
//! enter this module.

pub mod amplification;
pub mod cascade;
pub mod finite_size;
pub mod ldpc;
pub mod qber;

pub use amplification::{HashMethod, final_key_length, pack_bits};
pub use finite_size::{FiniteSizeAnalysis, finite_size_analysis};
pub use qber::{QberEstimate, estimate_qber};

use crate::core::errors::ConfigError;
use crate::physical::unit_interval;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

/// QBER above which no secure key can be distilled.
pub const QBER_THRESHOLD: f64 = 0.11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCorrection {
    Cascade { passes: usize },
    Ldpc,
}

impl Default for ErrorCorrection {
    fn default() -> Self {
        ErrorCorrection::Cascade {
            passes: cascade::DEFAULT_PASSES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PostProcessingConfig {
    error_correction: ErrorCorrection,
    privacy_amplification: HashMethod,
    reconciliation_efficiency: f64,
    security_bits: usize,
    epsilon: f64,
    sample_fraction: f64,
    qber_threshold: f64,
}

impl Default for PostProcessingConfig {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::default(),
            privacy_amplification: HashMethod::default(),
            reconciliation_efficiency: 1.16,
            security_bits: 128,
            epsilon: 1e-10,
            sample_fraction: 0.2,
            qber_threshold: QBER_THRESHOLD,
        }
    }
}

impl PostProcessingConfig {
    pub fn builder() -> PostProcessingConfigBuilder {
        PostProcessingConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn error_correction(&self) -> ErrorCorrection {
        self.error_correction
    }

    pub fn privacy_amplification(&self) -> HashMethod {
        self.privacy_amplification
    }

    pub fn reconciliation_efficiency(&self) -> f64 {
        self.reconciliation_efficiency
    }

    pub fn security_bits(&self) -> usize {
        self.security_bits
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn sample_fraction(&self) -> f64 {
        self.sample_fraction
    }

    pub fn qber_threshold(&self) -> f64 {
        self.qber_threshold
    }
}

#[derive(Debug, Clone)]
pub struct PostProcessingConfigBuilder {
    config: PostProcessingConfig,
}

impl PostProcessingConfigBuilder {
    pub fn error_correction(mut self, value: ErrorCorrection) -> Self {
        self.config.error_correction = value;
        self
    }

    pub fn privacy_amplification(mut self, value: HashMethod) -> Self {
        self.config.privacy_amplification = value;
        self
    }

    pub fn reconciliation_efficiency(mut self, value: f64) -> Self {
        self.config.reconciliation_efficiency = value;
        self
    }

    pub fn security_bits(mut self, value: usize) -> Self {
        self.config.security_bits = value;
        self
    }

    pub fn epsilon(mut self, value: f64) -> Self {
        self.config.epsilon = value;
        self
    }

    pub fn sample_fraction(mut self, value: f64) -> Self {
        self.config.sample_fraction = value;
        self
    }

    pub fn qber_threshold(mut self, value: f64) -> Self {
        self.config.qber_threshold = value;
        self
    }

    pub fn build(self) -> Result<PostProcessingConfig, ConfigError> {
        let c = self.config;
        if let ErrorCorrection::Cascade { passes } = c.error_correction {
            if passes == 0 {
                return Err(ConfigError::InvalidCount {
                    parameter: "cascade passes",
                    value: passes,
                    expected: "at least one pass",
                });
            }
        }
        if !(c.reconciliation_efficiency.is_finite() && c.reconciliation_efficiency >= 1.0) {
            return Err(ConfigError::OutOfRange {
                parameter: "reconciliation_efficiency",
                value: c.reconciliation_efficiency,
                expected: "a finite value >= 1",
            });
        }
        if !(c.epsilon > 0.0 && c.epsilon < 1.0) {
            return Err(ConfigError::OutOfRange {
                parameter: "epsilon",
                value: c.epsilon,
                expected: "a value in (0, 1)",
            });
        }
        unit_interval("sample_fraction", c.sample_fraction)?;
        if !(0.0..=0.5).contains(&c.qber_threshold) {
            return Err(ConfigError::OutOfRange {
                parameter: "qber_threshold",
                value: c.qber_threshold,
                expected: "a value in [0, 0.5]",
            });
        }
        Ok(c)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostProcessingResult {
    pub sifted_length: usize,
    pub sample_size: usize,
    pub sample_errors: usize,
    pub estimated_qber: f64,
    /// Key length entering privacy amplification.
    pub corrected_length: usize,
    /// Parities or syndrome bits disclosed during reconciliation.
    pub bits_revealed: usize,
    /// Errors left in Bob's key after reconciliation.
    pub residual_errors: usize,
    pub eve_information_fraction: f64,
    /// Seed selecting the public hash function.
    pub hash_seed: u64,
    pub final_key: Vec<bool>,
    pub final_key_length: usize,
    /// `final_key_length / corrected_length`.
    pub amplification_factor: f64,
    /// Whether Bob's amplified key equals Alice's.
    pub keys_match: bool,
    pub finite_size: FiniteSizeAnalysis,
    pub secure: bool,
}

impl PostProcessingResult {
    /// Final key as bytes, MSB first.
    pub fn final_key_bytes(&self) -> Vec<u8> {
        pack_bits(&self.final_key)
    }
}

/// Runs the whole classical pipeline on Alice's and Bob's sifted bits.
///
/// Degenerate inputs (empty key, empty sample, no room for a final key)
/// produce empty or zero results, never errors.
pub fn post_process<R: Rng + ?Sized>(
    alice: &[bool],
    bob: &[bool],
    config: &PostProcessingConfig,
    rng: &mut R,
) -> PostProcessingResult {
    debug_assert_eq!(alice.len(), bob.len());
    let sifted_length = alice.len();

    let estimate = estimate_qber(alice, bob, config.sample_fraction, rng);
    debug!(
        sifted_length,
        sample_size = estimate.sample_size,
        qber = estimate.qber,
        "QBER estimated"
    );

    let (corrected, bits_revealed) = match config.error_correction {
        ErrorCorrection::Cascade { passes } => {
            let res = cascade::cascade(
                &estimate.alice_remaining,
                &estimate.bob_remaining,
                estimate.qber,
                passes,
                rng,
            );
            (res.corrected, res.bits_revealed)
        }
        ErrorCorrection::Ldpc => {
            let res = ldpc::ldpc_reconcile(
                &estimate.alice_remaining,
                &estimate.bob_remaining,
                estimate.qber,
                config.reconciliation_efficiency,
                rng,
            );
            (res.corrected, res.bits_revealed)
        }
    };

    let alice_key = &estimate.alice_remaining;
    let corrected_length = alice_key.len();
    let residual_errors = alice_key
        .iter()
        .zip(&corrected)
        .filter(|(a, b)| a != b)
        .count();
    debug!(corrected_length, bits_revealed, residual_errors, "reconciliation finished");

    let eve_information_fraction = amplification::eve_information_fraction(
        estimate.qber,
        bits_revealed,
        corrected_length,
    );
    let final_key_length =
        final_key_length(corrected_length, eve_information_fraction, config.security_bits);

    let hash_seed: u64 = rng.random();
    let method = config.privacy_amplification;
    let final_key = amplification::amplify(alice_key, final_key_length, method, hash_seed);
    let bob_final = amplification::amplify(&corrected, final_key_length, method, hash_seed);
    let keys_match = final_key == bob_final;

    let amplification_factor = if corrected_length > 0 {
        final_key_length as f64 / corrected_length as f64
    } else {
        0.0
    };
    let finite_size = finite_size_analysis(
        corrected_length,
        estimate.qber,
        config.reconciliation_efficiency,
        config.epsilon,
    );
    let secure = final_key_length > 0 && estimate.qber <= config.qber_threshold;

    debug!(
        final_key_length,
        eve_information_fraction, keys_match, secure, "privacy amplification finished"
    );

    PostProcessingResult {
        sifted_length,
        sample_size: estimate.sample_size,
        sample_errors: estimate.sample_errors,
        estimated_qber: estimate.qber,
        corrected_length,
        bits_revealed,
        residual_errors,
        eve_information_fraction,
        hash_seed,
        final_key,
        final_key_length,
        amplification_factor,
        keys_match,
        finite_size,
        secure,
    }
}
