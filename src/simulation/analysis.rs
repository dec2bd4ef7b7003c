//! Security metrics derived from a finished protocol run.

use crate::core::utils::binary_entropy;
use crate::protocols::Protocol;
use serde::Serialize;
use std::fmt;

/// QBER below which a run can be declared secure.
pub const SECURE_QBER: f64 = 0.11;
/// QBER above which a run is declared compromised.
pub const COMPROMISED_QBER: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SecurityVerdict {
    Secure,
    Compromised,
    Unknown,
}

impl fmt::Display for SecurityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SecurityVerdict::Secure => "secure",
            SecurityVerdict::Compromised => "compromised",
            SecurityVerdict::Unknown => "unknown",
        })
    }
}

/// Composite analysis block of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SecurityAnalysis {
    /// Error rate of the whole sifted key.
    pub qber: f64,
    /// Sifted bits per signal sent.
    pub key_rate: f64,
    pub eve_information: f64,
    /// Devetak-Winter rate per signal sent.
    pub secret_key_rate: f64,
    pub verdict: SecurityVerdict,
    pub chsh_s_value: Option<f64>,
    pub bell_violated: Option<bool>,
    pub bell_significance: Option<f64>,
}

/// Holevo bound on Eve's information from the CHSH value,
/// $\chi(S) = H_2\big((1 + \sqrt{(S/2)^2 - 1})/2\big)$; 1 when $|S| \le 2$.
pub fn chsh_eve_information(s_value: f64) -> f64 {
    let s = s_value.abs();
    if s <= 2.0 {
        return 1.0;
    }
    let root = ((s / 2.0).powi(2) - 1.0).max(0.0).sqrt().min(1.0);
    binary_entropy((1.0 + root) / 2.0)
}

/// Larger of the measured attack information and the protocol's bound.
pub fn eve_information_bound(
    protocol: Protocol,
    qber: f64,
    s_value: Option<f64>,
    measured: f64,
) -> f64 {
    let bound = match (protocol, s_value) {
        (Protocol::E91, Some(s)) => chsh_eve_information(s),
        _ => binary_entropy(qber),
    };
    measured.max(bound).clamp(0.0, 1.0)
}

/// $r = R\,\max(0, 1 - H_2(Q) - I_E)$.
pub fn secret_key_rate(key_rate: f64, qber: f64, eve_information: f64) -> f64 {
    key_rate * (1.0 - binary_entropy(qber) - eve_information).max(0.0)
}

/// Decision rules for a run.
///
/// An empty sifted key is always `Unknown`. E91 is secure below 11% QBER when
/// either no attack was configured or the Bell test was violated; it is
/// compromised above 15% QBER or when an attack meets an unviolated Bell test.
/// B92 depends on QBER only.
pub fn security_verdict(
    protocol: Protocol,
    sifted_length: usize,
    qber: f64,
    bell_violated: Option<bool>,
    attack_configured: bool,
) -> SecurityVerdict {
    if sifted_length == 0 {
        return SecurityVerdict::Unknown;
    }
    match protocol {
        Protocol::E91 => {
            let violated = bell_violated.unwrap_or(false);
            if (!attack_configured || violated) && qber < SECURE_QBER {
                SecurityVerdict::Secure
            } else if qber > COMPROMISED_QBER || (!violated && attack_configured) {
                SecurityVerdict::Compromised
            } else {
                SecurityVerdict::Unknown
            }
        }
        Protocol::B92 => {
            if qber < SECURE_QBER {
                SecurityVerdict::Secure
            } else if qber > COMPROMISED_QBER {
                SecurityVerdict::Compromised
            } else {
                SecurityVerdict::Unknown
            }
        }
    }
}
