//! Quantum Key Distribution (QKD) Protocols.
//!
//! This module contains the two protocol engines:
//! - **B92**: two non-orthogonal states, Bob discriminates them unambiguously.
//! - **E91**: entangled pairs, three measurement angles per side and a CHSH test.

pub mod b92;
pub mod e91;

use serde::Serialize;

/// Bob's record of one B92 time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalOutcome {
    /// No click.
    Lost,
    /// Click, but the outcome does not identify Alice's state.
    Inconclusive,
    /// Click caused by detector noise, carrying a random bit.
    DarkCount(bool),
    Conclusive(bool),
}

impl SignalOutcome {
    /// Bit that enters the sifted key, if any.
    pub fn key_bit(&self) -> Option<bool> {
        match *self {
            SignalOutcome::Conclusive(bit) | SignalOutcome::DarkCount(bit) => Some(bit),
            SignalOutcome::Lost | SignalOutcome::Inconclusive => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        !matches!(self, SignalOutcome::Lost)
    }
}

/// Alice's and Bob's copies of the sifted key, aligned bit by bit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiftedKey {
    pub alice: Vec<bool>,
    pub bob: Vec<bool>,
}

impl SiftedKey {
    pub fn push(&mut self, alice: bool, bob: bool) {
        self.alice.push(alice);
        self.bob.push(bob);
    }

    pub fn len(&self) -> usize {
        self.alice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alice.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.alice
            .iter()
            .zip(&self.bob)
            .filter(|(a, b)| a != b)
            .count()
    }

    /// Fraction of disagreeing bits; 0 for an empty key.
    pub fn error_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.error_count() as f64 / self.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_has_zero_error_rate() {
        assert_eq!(SiftedKey::default().error_rate(), 0.0);
    }

    #[test]
    fn counts_disagreements() {
        let mut key = SiftedKey::default();
        key.push(true, true);
        key.push(false, true);
        key.push(true, false);
        key.push(false, false);
        assert_eq!(key.error_count(), 2);
        assert!((key.error_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn only_clicks_with_bits_enter_the_key() {
        assert_eq!(SignalOutcome::Lost.key_bit(), None);
        assert_eq!(SignalOutcome::Inconclusive.key_bit(), None);
        assert_eq!(SignalOutcome::DarkCount(true).key_bit(), Some(true));
        assert_eq!(SignalOutcome::Conclusive(false).key_bit(), Some(false));
    }
}
