//! E91 Quantum Key Distribution Protocol.
//!
//! Ekert's 1991 protocol distributes entangled pairs. Alice and Bob each
//! measure along one of three angles; the single shared angle yields key
//! bits and the remaining combinations feed a CHSH Bell test that bounds
//! what an eavesdropper can know.

use crate::core::errors::{ConfigError, QkdError, StateError};
use crate::core::{BellState, BipartiteDensityMatrix, Subsystem};
use crate::eavesdropper::{AttackContext, EveAttackConfig, Signal};
use crate::physical::{ChannelParameters, Detector, DetectorEvent, FiberChannel};
use crate::protocols::Protocol;
use crate::protocols::qkd::SiftedKey;
use rand::Rng;
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use tracing::debug;

/// Alice's measurement angles $a_1, a_2, a_3$.
pub const ALICE_ANGLES: [f64; 3] = [0.0, FRAC_PI_4, FRAC_PI_2];
/// Bob's measurement angles $b_1, b_2, b_3$.
pub const BOB_ANGLES: [f64; 3] = [FRAC_PI_4, FRAC_PI_2, 3.0 * FRAC_PI_4];

/// Basis indices `(alice, bob)` that share an angle and form the key.
pub const KEY_BASES: (usize, usize) = (1, 0);

/// Basis index pairs of the four CHSH correlators, in the order
/// $E(a_1,b_1)$, $E(a_1,b_3)$, $E(a_3,b_1)$, $E(a_3,b_3)$.
pub const CHSH_BASES: [(usize, usize); 4] = [(0, 0), (0, 2), (2, 0), (2, 2)];

/// Signs of the correlators in $S = E_{11} - E_{13} + E_{31} + E_{33}$.
const CHSH_SIGNS: [f64; 4] = [1.0, -1.0, 1.0, 1.0];

/// Largest |S| allowed by local hidden variables.
pub const CLASSICAL_BOUND: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairRole {
    Key,
    ChshTest,
}

impl PairRole {
    pub fn for_bases(alice_basis: usize, bob_basis: usize) -> Self {
        if (alice_basis, bob_basis) == KEY_BASES {
            PairRole::Key
        } else {
            PairRole::ChshTest
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairOutcome {
    /// At least one side registered nothing.
    Lost,
    /// Raw outcomes, before any Bell-state correction.
    Measured {
        alice: bool,
        bob: bool,
        dark_count: bool,
    },
}

/// Record of one distributed pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct E91PairResult {
    pub alice_basis: usize,
    pub bob_basis: usize,
    pub role: PairRole,
    pub outcome: PairOutcome,
    pub eve_intercepted: bool,
    /// Eve's guess of Alice's bit, already corrected for anti-correlated states.
    pub eve_bit: Option<bool>,
    pub eve_information: f64,
}

/// CHSH test over the measured test pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChshResult {
    /// $E(a_1,b_1)$, $E(a_1,b_3)$, $E(a_3,b_1)$, $E(a_3,b_3)$.
    pub correlations: [f64; 4],
    pub counts: [usize; 4],
    pub s_value: f64,
    pub bell_violated: bool,
    /// $(|S| - 2)/\sigma_S$ in standard deviations.
    pub significance: f64,
}

impl ChshResult {
    /// Estimates the correlators from raw outcomes. Any empty correlator
    /// leaves S at 0.
    pub fn from_pairs(pairs: &[E91PairResult]) -> Self {
        let mut sums = [0i64; 4];
        let mut counts = [0usize; 4];

        for pair in pairs {
            let PairOutcome::Measured { alice, bob, .. } = pair.outcome else {
                continue;
            };
            if let Some(slot) = CHSH_BASES
                .iter()
                .position(|&b| b == (pair.alice_basis, pair.bob_basis))
            {
                counts[slot] += 1;
                sums[slot] += if alice == bob { 1 } else { -1 };
            }
        }

        if counts.contains(&0) {
            return Self {
                correlations: [0.0; 4],
                counts,
                s_value: 0.0,
                bell_violated: false,
                significance: 0.0,
            };
        }

        let correlations: [f64; 4] =
            std::array::from_fn(|i| sums[i] as f64 / counts[i] as f64);
        Self::from_correlations(correlations, counts)
    }

    /// Builds the result from known correlators and their sample sizes.
    pub fn from_correlations(correlations: [f64; 4], counts: [usize; 4]) -> Self {
        let s_value: f64 = correlations
            .iter()
            .zip(CHSH_SIGNS)
            .map(|(e, sign)| sign * e)
            .sum();

        let variance: f64 = correlations
            .iter()
            .zip(counts)
            .filter(|(_, n)| *n > 0)
            .map(|(e, n)| (1.0 - e * e) / n as f64)
            .sum();
        let excess = s_value.abs() - CLASSICAL_BOUND;
        let significance = if variance > 0.0 {
            excess / variance.sqrt()
        } else if excess > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Self {
            correlations,
            counts,
            s_value,
            bell_violated: s_value.abs() > CLASSICAL_BOUND,
            significance,
        }
    }
}

/// Exact S of a two-qubit state for the protocol's CHSH angles.
pub fn theoretical_s_value(state: &BipartiteDensityMatrix) -> f64 {
    CHSH_BASES
        .iter()
        .zip(CHSH_SIGNS)
        .map(|(&(a, b), sign)| sign * state.correlation(ALICE_ANGLES[a], BOB_ANGLES[b]))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct E91Statistics {
    pub num_pairs: usize,
    pub measured: usize,
    pub lost: usize,
    pub dark_counts: usize,
    pub key_pairs: usize,
    pub test_pairs: usize,
    pub eve_interceptions: usize,
    pub eve_correct_bits: usize,
    pub qber: f64,
    /// S of the noisy pair Bob receives, without an eavesdropper.
    pub expected_s_value: f64,
    pub mean_eve_information: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct E91Result {
    pub pairs: Vec<E91PairResult>,
    pub chsh: ChshResult,
    pub statistics: E91Statistics,
    pub sifted_key: SiftedKey,
}

/// Per-pair E91 simulation. The source sits with Alice; only Bob's photon
/// crosses the fiber.
#[derive(Debug, Clone)]
pub struct E91Engine {
    params: ChannelParameters,
    fiber: FiberChannel,
    detector: Detector,
    eve: Option<EveAttackConfig>,
    bell_state: BellState,
    // Bob flips his key bits for anti-correlated states
    invert_bob: bool,
}

impl E91Engine {
    pub fn new(
        params: &ChannelParameters,
        eve: Option<EveAttackConfig>,
        bell_state: BellState,
    ) -> Result<Self, QkdError> {
        let sign = bell_state
            .correlation_sign()
            .ok_or(ConfigError::UnsupportedBellState(bell_state.name()))?;
        Ok(Self {
            params: *params,
            fiber: FiberChannel::new(params)?,
            detector: Detector::new(params),
            eve,
            bell_state,
            invert_bob: sign < 0.0,
        })
    }

    pub fn bell_state(&self) -> BellState {
        self.bell_state
    }

    /// S of the source state after fiber noise.
    pub fn expected_s_value(&self) -> f64 {
        let received = self
            .fiber
            .apply_noise_to_pair(&BipartiteDensityMatrix::bell(self.bell_state));
        theoretical_s_value(&received)
    }

    /// Simulates one pair: creation, optional attack, fiber, both detectors.
    pub fn simulate_pair<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<E91PairResult, StateError> {
        let alice_basis = rng.random_range(0..ALICE_ANGLES.len());
        let bob_basis = rng.random_range(0..BOB_ANGLES.len());
        let role = PairRole::for_bases(alice_basis, bob_basis);

        let mut pair = BipartiteDensityMatrix::bell(self.bell_state);
        let mut bob_photon = true;
        let mut eve_intercepted = false;
        let mut eve_bit = None;
        let mut eve_information = 0.0;

        if let Some(eve) = self.eve.as_ref().filter(|e| e.intercepts(rng)) {
            let ctx = AttackContext {
                alice_bit: None,
                alice_basis: ALICE_ANGLES[alice_basis],
                protocol: Protocol::E91,
                mean_photon_number: self.params.mean_photon_number(),
            };
            let attack = eve
                .strategy()
                .attack(Signal::Pair(pair.clone()), &ctx, rng)?;
            eve_intercepted = true;
            // Eve holds Bob's half, so her raw outcome needs Bob's correction
            eve_bit = attack.eve_bit.map(|b| b ^ self.invert_bob);
            eve_information = attack.mutual_information;
            match attack.state_after {
                Some(Signal::Pair(p)) => pair = p,
                // Bob's photon is gone; Alice's half keeps its marginal.
                _ => bob_photon = false,
            }
        }

        if bob_photon {
            match self.fiber.transmit_pair(&pair, rng) {
                Some(p) => pair = p,
                None => bob_photon = false,
            }
        }

        let alice_event = self.detector.detect(true, rng);
        let bob_event = self.detector.detect(bob_photon, rng);
        let alice_angle = ALICE_ANGLES[alice_basis];
        let bob_angle = BOB_ANGLES[bob_basis];

        let outcome = match (alice_event, bob_event) {
            (DetectorEvent::Silent, _) | (_, DetectorEvent::Silent) => PairOutcome::Lost,
            (DetectorEvent::Signal, DetectorEvent::Signal) => {
                let (ra, collapsed) = pair.measure_subsystem(Subsystem::A, alice_angle, rng);
                let (rb, _) = collapsed.measure_subsystem(Subsystem::B, bob_angle, rng);
                PairOutcome::Measured {
                    alice: ra.bit(),
                    bob: rb.bit(),
                    dark_count: false,
                }
            }
            (DetectorEvent::Signal, DetectorEvent::DarkCount(bob)) => {
                let (ra, _) = pair.measure_subsystem(Subsystem::A, alice_angle, rng);
                PairOutcome::Measured {
                    alice: ra.bit(),
                    bob,
                    dark_count: true,
                }
            }
            (DetectorEvent::DarkCount(alice), DetectorEvent::Signal) => {
                let (rb, _) = pair.measure_subsystem(Subsystem::B, bob_angle, rng);
                PairOutcome::Measured {
                    alice,
                    bob: rb.bit(),
                    dark_count: true,
                }
            }
            (DetectorEvent::DarkCount(alice), DetectorEvent::DarkCount(bob)) => {
                PairOutcome::Measured {
                    alice,
                    bob,
                    dark_count: true,
                }
            }
        };

        Ok(E91PairResult {
            alice_basis,
            bob_basis,
            role,
            outcome,
            eve_intercepted,
            eve_bit,
            eve_information,
        })
    }

    /// Runs the protocol for `num_pairs` pairs.
    ///
    /// # Returns
    ///
    /// Per-pair records, the CHSH test, aggregate statistics and the sifted
    /// key built from the key-basis pairs.
    pub fn run<R: Rng + ?Sized>(
        &self,
        num_pairs: usize,
        rng: &mut R,
    ) -> Result<E91Result, StateError> {
        let pairs = (0..num_pairs)
            .map(|_| self.simulate_pair(rng))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sifted_key = SiftedKey::default();
        let mut stats = E91Statistics {
            num_pairs,
            ..Default::default()
        };
        let mut eve_information_sum = 0.0;

        for pair in &pairs {
            if pair.eve_intercepted {
                stats.eve_interceptions += 1;
            }
            let PairOutcome::Measured {
                alice,
                bob,
                dark_count,
            } = pair.outcome
            else {
                stats.lost += 1;
                continue;
            };
            stats.measured += 1;
            if dark_count {
                stats.dark_counts += 1;
            }
            match pair.role {
                PairRole::ChshTest => stats.test_pairs += 1,
                PairRole::Key => {
                    stats.key_pairs += 1;
                    sifted_key.push(alice, bob ^ self.invert_bob);
                    eve_information_sum += pair.eve_information;
                    if pair.eve_bit == Some(alice) {
                        stats.eve_correct_bits += 1;
                    }
                }
            }
        }

        let chsh = ChshResult::from_pairs(&pairs);
        stats.qber = sifted_key.error_rate();
        stats.expected_s_value = self.expected_s_value();
        stats.mean_eve_information = if sifted_key.is_empty() {
            0.0
        } else {
            eve_information_sum / sifted_key.len() as f64
        };

        debug!(
            protocol = "E91",
            num_pairs,
            measured = stats.measured,
            key_pairs = stats.key_pairs,
            s_value = chsh.s_value,
            qber = stats.qber,
            "E91 exchange finished"
        );

        Ok(E91Result {
            pairs,
            chsh,
            statistics: stats,
            sifted_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eavesdropper::AttackKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn tsirelson_bound_for_phi_plus() {
        let s = theoretical_s_value(&BipartiteDensityMatrix::bell(BellState::PhiPlus));
        assert!((s - 2.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn singlet_gives_negative_s() {
        let s = theoretical_s_value(&BipartiteDensityMatrix::bell(BellState::PsiMinus));
        assert!((s + 2.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn heavy_white_noise_restores_classical_bound() {
        let w = BipartiteDensityMatrix::werner(BellState::PhiPlus, 0.5).unwrap();
        assert!(theoretical_s_value(&w).abs() <= CLASSICAL_BOUND);
    }

    #[test]
    fn only_shared_angle_is_key() {
        assert_eq!(PairRole::for_bases(1, 0), PairRole::Key);
        assert_eq!(PairRole::for_bases(0, 0), PairRole::ChshTest);
        assert_eq!(ALICE_ANGLES[KEY_BASES.0], BOB_ANGLES[KEY_BASES.1]);
    }

    #[test]
    fn unsupported_bell_state_is_rejected() {
        let err =
            E91Engine::new(&ChannelParameters::ideal(), None, BellState::PsiPlus).unwrap_err();
        assert_eq!(
            err,
            QkdError::Config(ConfigError::UnsupportedBellState("psi+"))
        );
    }

    #[test]
    fn singlet_key_is_corrected() {
        let engine =
            E91Engine::new(&ChannelParameters::ideal(), None, BellState::PsiMinus).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let result = engine.run(3000, &mut rng).unwrap();
        assert!(!result.sifted_key.is_empty());
        assert!(result.statistics.qber < 0.03);
        assert!(result.chsh.s_value < -2.0);
    }

    #[test]
    fn eve_guess_rate_is_independent_of_bell_state() {
        let eve = EveAttackConfig::new(AttackKind::InterceptResend, 1.0).unwrap();
        let hit_rate = |bell_state| {
            let engine =
                E91Engine::new(&ChannelParameters::ideal(), Some(eve), bell_state).unwrap();
            let mut rng = ChaCha20Rng::seed_from_u64(7);
            let stats = engine.run(20_000, &mut rng).unwrap().statistics;
            stats.eve_correct_bits as f64 / stats.key_pairs as f64
        };
        let phi = hit_rate(BellState::PhiPlus);
        let psi = hit_rate(BellState::PsiMinus);
        assert!(phi > 0.7, "phi+ {phi}");
        assert!(psi > 0.7, "psi- {psi}");
        assert!((phi - psi).abs() < 0.05, "phi+ {phi} psi- {psi}");
    }

    #[test]
    fn empty_chsh_when_no_pairs() {
        let chsh = ChshResult::from_pairs(&[]);
        assert_eq!(chsh.s_value, 0.0);
        assert!(!chsh.bell_violated);
    }
}
