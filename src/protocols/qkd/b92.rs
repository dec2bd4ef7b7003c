//! B92 Quantum Key Distribution Protocol.
//!
//! B92 is a simplified version of BB84 proposed by Charles Bennett in 1992.
//! It uses only two non-orthogonal quantum states, |0> for bit 0 and |+> for bit 1.
//! Bob measures in a random basis and keeps only the outcomes that rule one
//! of the two states out.

use crate::core::{DensityMatrix, Gate, Measurement};
use crate::core::errors::{ChannelError, StateError};
use crate::eavesdropper::{AttackContext, EveAttackConfig, Signal};
use crate::physical::{ChannelParameters, Detector, DetectorEvent, FiberChannel};
use crate::protocols::Protocol;
use crate::protocols::qkd::{SiftedKey, SignalOutcome};
use rand::Rng;
use serde::Serialize;
use std::f64::consts::FRAC_PI_2;
use tracing::debug;

/// Bob's measurement basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum B92Basis {
    Z,
    X,
}

impl B92Basis {
    pub fn angle(self) -> f64 {
        match self {
            B92Basis::Z => 0.0,
            B92Basis::X => FRAC_PI_2,
        }
    }

    /// The basis in which Alice's state for `bit` can be ruled out.
    pub fn conjugate_to(bit: bool) -> Self {
        if bit { B92Basis::Z } else { B92Basis::X }
    }
}

/// Bloch angle of the state Alice sends for `bit`.
pub fn encoding_angle(bit: bool) -> f64 {
    if bit { FRAC_PI_2 } else { 0.0 }
}

/// Bit 0 -> $|0\rangle$, bit 1 -> $|+\rangle$, rotated out of $|0\rangle$.
pub fn prepare_state(bit: bool) -> DensityMatrix {
    DensityMatrix::zero().apply_unitary(&Gate::ry(encoding_angle(bit)))
}

/// Unambiguous discrimination: `Z` outcome 1 excludes |0>, `X` outcome "minus" excludes |+>.
pub fn interpret(basis: B92Basis, outcome: bool) -> SignalOutcome {
    match (basis, outcome) {
        (B92Basis::Z, true) => SignalOutcome::Conclusive(true),
        (B92Basis::X, true) => SignalOutcome::Conclusive(false),
        _ => SignalOutcome::Inconclusive,
    }
}

/// Record of one transmitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct B92BitResult {
    pub alice_bit: bool,
    pub bob_basis: B92Basis,
    pub outcome: SignalOutcome,
    pub eve_intercepted: bool,
    pub eve_bit: Option<bool>,
    /// Eve's mutual information with `alice_bit`.
    pub eve_information: f64,
}

impl B92BitResult {
    pub fn in_sifted_key(&self) -> bool {
        self.outcome.key_bit().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct B92Statistics {
    pub num_signals: usize,
    /// Slots where Bob's detector clicked.
    pub detected: usize,
    pub lost: usize,
    pub inconclusive: usize,
    /// Conclusive results, dark counts included.
    pub conclusive: usize,
    pub dark_counts: usize,
    pub eve_interceptions: usize,
    /// Sifted bits whose value Eve guessed correctly.
    pub eve_correct_bits: usize,
    /// Conclusive / detected.
    pub conclusive_rate: f64,
    /// Conclusive / detected signals measured in the basis conjugate to Alice's state.
    pub usd_efficiency: f64,
    pub qber: f64,
    pub expected_conclusive_rate: f64,
    pub expected_qber: f64,
    /// Average attack information per sifted bit.
    pub mean_eve_information: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct B92Result {
    pub bits: Vec<B92BitResult>,
    pub statistics: B92Statistics,
    pub sifted_key: SiftedKey,
}

/// Per-signal B92 simulation over a fixed channel.
#[derive(Debug, Clone)]
pub struct B92Engine {
    params: ChannelParameters,
    fiber: FiberChannel,
    detector: Detector,
    eve: Option<EveAttackConfig>,
}

impl B92Engine {
    pub fn new(
        params: &ChannelParameters,
        eve: Option<EveAttackConfig>,
    ) -> Result<Self, ChannelError> {
        Ok(Self {
            params: *params,
            fiber: FiberChannel::new(params)?,
            detector: Detector::new(params),
            eve,
        })
    }

    pub fn fiber(&self) -> &FiberChannel {
        &self.fiber
    }

    /// Simulates one signal: preparation, optional attack, fiber, detection.
    pub fn simulate_signal<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<B92BitResult, StateError> {
        let alice_bit = rng.random_bool(0.5);
        let bob_basis = if rng.random_bool(0.5) {
            B92Basis::X
        } else {
            B92Basis::Z
        };

        let mut state = Some(prepare_state(alice_bit));
        let mut eve_intercepted = false;
        let mut eve_bit = None;
        let mut eve_information = 0.0;

        if let Some(eve) = self.eve.as_ref().filter(|e| e.intercepts(rng)) {
            let ctx = AttackContext {
                alice_bit: Some(alice_bit),
                alice_basis: encoding_angle(alice_bit),
                protocol: Protocol::B92,
                mean_photon_number: self.params.mean_photon_number(),
            };
            let signal = Signal::Qubit(prepare_state(alice_bit));
            let attack = eve.strategy().attack(signal, &ctx, rng)?;
            eve_intercepted = true;
            eve_bit = attack.eve_bit;
            eve_information = attack.mutual_information;
            state = match attack.state_after {
                Some(Signal::Qubit(s)) => Some(s),
                _ => None,
            };
        }

        let arrived = state.and_then(|s| self.fiber.transmit(&s, rng));
        let outcome = match self.detector.detect(arrived.is_some(), rng) {
            DetectorEvent::Silent => SignalOutcome::Lost,
            DetectorEvent::DarkCount(bit) => SignalOutcome::DarkCount(bit),
            DetectorEvent::Signal => match arrived {
                Some(s) => {
                    let (res, _) = s.measure_in_basis(bob_basis.angle(), rng);
                    interpret(bob_basis, res.bit())
                }
                None => SignalOutcome::Lost,
            },
        };

        Ok(B92BitResult {
            alice_bit,
            bob_basis,
            outcome,
            eve_intercepted,
            eve_bit,
            eve_information,
        })
    }

    /// Runs the protocol for `num_signals` signals.
    ///
    /// # Arguments
    ///
    /// * `num_signals` - Number of signals Alice sends.
    /// * `rng` - Random source consumed sequentially by every stage.
    ///
    /// # Returns
    ///
    /// Per-signal records, aggregate statistics and the sifted key. A run in
    /// which nothing survives returns an empty key with QBER 0.
    pub fn run<R: Rng + ?Sized>(
        &self,
        num_signals: usize,
        rng: &mut R,
    ) -> Result<B92Result, StateError> {
        let bits = (0..num_signals)
            .map(|_| self.simulate_signal(rng))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sifted_key = SiftedKey::default();
        let mut stats = B92Statistics {
            num_signals,
            ..Default::default()
        };
        let mut conjugate_detected = 0usize;
        let mut conjugate_conclusive = 0usize;
        let mut eve_information_sum = 0.0;

        for bit in &bits {
            if bit.eve_intercepted {
                stats.eve_interceptions += 1;
            }
            match bit.outcome {
                SignalOutcome::Lost => stats.lost += 1,
                SignalOutcome::Inconclusive => stats.inconclusive += 1,
                SignalOutcome::DarkCount(_) => stats.dark_counts += 1,
                SignalOutcome::Conclusive(_) => {}
            }
            if bit.outcome.is_detected() && bit.bob_basis == B92Basis::conjugate_to(bit.alice_bit)
            {
                conjugate_detected += 1;
                if bit.in_sifted_key() {
                    conjugate_conclusive += 1;
                }
            }
            if let Some(bob_bit) = bit.outcome.key_bit() {
                sifted_key.push(bit.alice_bit, bob_bit);
                eve_information_sum += bit.eve_information;
                if bit.eve_bit == Some(bit.alice_bit) {
                    stats.eve_correct_bits += 1;
                }
            }
        }

        stats.detected = num_signals - stats.lost;
        stats.conclusive = sifted_key.len();
        stats.conclusive_rate = ratio(stats.conclusive, stats.detected);
        stats.usd_efficiency = ratio(conjugate_conclusive, conjugate_detected);
        stats.qber = sifted_key.error_rate();
        stats.mean_eve_information = if sifted_key.is_empty() {
            0.0
        } else {
            eve_information_sum / sifted_key.len() as f64
        };
        let (expected_conclusive_rate, expected_qber) = self.expected_rates();
        stats.expected_conclusive_rate = expected_conclusive_rate;
        stats.expected_qber = expected_qber;

        debug!(
            protocol = "B92",
            num_signals,
            detected = stats.detected,
            conclusive = stats.conclusive,
            dark_counts = stats.dark_counts,
            qber = stats.qber,
            "B92 exchange finished"
        );

        Ok(B92Result {
            bits,
            statistics: stats,
            sifted_key,
        })
    }

    /// Conclusive rate per detected signal and QBER predicted from the fiber
    /// noise alone, averaged over Alice's bit and Bob's basis.
    pub fn expected_rates(&self) -> (f64, f64) {
        let mut conclusive = 0.0;
        let mut errors = 0.0;
        for alice_bit in [false, true] {
            let received = self.fiber.apply_noise(&prepare_state(alice_bit));
            for basis in [B92Basis::Z, B92Basis::X] {
                let measurement = Measurement::projective(basis.angle());
                let p_one = received.probabilities(&measurement)[1];
                conclusive += 0.25 * p_one;
                if let SignalOutcome::Conclusive(bob_bit) = interpret(basis, true) {
                    if bob_bit != alice_bit {
                        errors += 0.25 * p_one;
                    }
                }
            }
        }
        let qber = if conclusive > 0.0 {
            errors / conclusive
        } else {
            0.0
        };
        (conclusive, qber)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eavesdropper::AttackKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn usd_never_misidentifies_noiseless_states() {
        let mut rng = ChaCha20Rng::seed_from_u64(17);
        for _ in 0..200 {
            let bit = rng.random_bool(0.5);
            for basis in [B92Basis::Z, B92Basis::X] {
                let (res, _) = prepare_state(bit).measure_in_basis(basis.angle(), &mut rng);
                if let SignalOutcome::Conclusive(b) = interpret(basis, res.bit()) {
                    assert_eq!(b, bit);
                }
            }
        }
    }

    #[test]
    fn prepared_states_match_b92_alphabet() {
        assert!((prepare_state(false).fidelity(&DensityMatrix::zero()) - 1.0).abs() < 1e-6);
        assert!((prepare_state(true).fidelity(&DensityMatrix::plus()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ideal_expected_rates() {
        let engine = B92Engine::new(&ChannelParameters::ideal(), None).unwrap();
        let (rate, qber) = engine.expected_rates();
        // 0.25 from USD plus the misalignment floor on |0> in Z
        assert!((rate - (0.25 + 0.25 * 0.005)).abs() < 1e-9);
        assert!(qber > 0.004 && qber < 0.006);
    }

    #[test]
    fn total_loss_gives_empty_key() {
        let params = ChannelParameters::builder()
            .fiber_length_km(2000.0)
            .dark_count_rate_hz(0.0)
            .build()
            .unwrap();
        let engine = B92Engine::new(&params, None).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let result = engine.run(500, &mut rng).unwrap();
        assert!(result.sifted_key.is_empty());
        assert_eq!(result.statistics.qber, 0.0);
        assert_eq!(result.statistics.lost, 500);
    }

    #[test]
    fn pns_leaks_every_sifted_bit_without_errors() {
        let eve = EveAttackConfig::new(AttackKind::PhotonNumberSplitting, 1.0).unwrap();
        let params = ChannelParameters::builder()
            .fiber_length_km(0.0)
            .detector_efficiency(1.0)
            .dark_count_rate_hz(0.0)
            .misalignment_error(0.0)
            .mean_photon_number(0.5)
            .build()
            .unwrap();
        let engine = B92Engine::new(&params, Some(eve)).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let result = engine.run(20_000, &mut rng).unwrap();
        let stats = result.statistics;
        assert!(!result.sifted_key.is_empty());
        assert_eq!(stats.qber, 0.0);
        assert_eq!(stats.mean_eve_information, 1.0);
        assert_eq!(stats.eve_correct_bits, result.sifted_key.len());
        // single-photon pulses are blocked
        assert!(stats.lost > 10_000);
    }

    #[test]
    fn beam_splitting_only_adds_loss() {
        let eve = EveAttackConfig::new(AttackKind::BeamSplitting, 1.0).unwrap();
        let params = ChannelParameters::builder()
            .fiber_length_km(0.0)
            .detector_efficiency(1.0)
            .dark_count_rate_hz(0.0)
            .misalignment_error(0.0)
            .build()
            .unwrap();
        let engine = B92Engine::new(&params, Some(eve)).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let result = engine.run(4000, &mut rng).unwrap();
        assert_eq!(result.statistics.qber, 0.0);
        let loss = result.statistics.lost as f64 / 4000.0;
        assert!((loss - 0.5).abs() < 0.05);
    }
}
