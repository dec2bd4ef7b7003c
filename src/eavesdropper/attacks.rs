use crate::core::errors::StateError;
use crate::core::utils::{self, binary_entropy};
use crate::core::{DensityMatrix, KrausChannel, Subsystem};
use crate::eavesdropper::{AttackContext, EveAttackResult, Signal};
use crate::protocols::Protocol;
use rand::Rng;
use rand::seq::IndexedRandom;

/// Disturbance of the optimal universal (Buzek-Hillery) cloner.
const CLONING_DISTURBANCE: f64 = 1.0 / 6.0;

/// Largest error a collective probe introduces at full coupling,
/// $(1 - 1/\sqrt{2})/2$.
pub const COLLECTIVE_MAX_DISTURBANCE: f64 = (1.0 - std::f64::consts::FRAC_1_SQRT_2) / 2.0;

const BASIS_TOLERANCE: f64 = 1e-9;

/// One eavesdropping strategy with its coupling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EveStrategy {
    /// Measure in a random protocol basis and resend the outcome.
    InterceptResend,
    /// Divert the whole photon with probability `tap_ratio`.
    BeamSplitting { tap_ratio: f64 },
    /// 1 -> 2 universal cloner; Bob gets a copy with Bloch vector shrunk to 2/3.
    OptimalCloning,
    /// Entangle with Bob's half, leaving the Werner state $(1-p)\rho + p I/4$.
    EntanglementCloning { mixing: f64 },
    /// Keep one photon of every multi-photon pulse, block single photons.
    PhotonNumberSplitting,
    /// Weak probe held in quantum memory, measured jointly after sifting.
    Collective { coupling: f64 },
}

impl EveStrategy {
    /// Attacks one signal that Eve has decided to intercept.
    pub fn attack<R: Rng + ?Sized>(
        &self,
        signal: Signal,
        ctx: &AttackContext,
        rng: &mut R,
    ) -> Result<EveAttackResult, StateError> {
        match *self {
            EveStrategy::InterceptResend => Ok(intercept_resend(signal, ctx, rng)),
            EveStrategy::BeamSplitting { tap_ratio } => {
                Ok(beam_splitting(signal, ctx, tap_ratio, rng))
            }
            EveStrategy::OptimalCloning => optimal_cloning(signal, ctx, rng),
            EveStrategy::EntanglementCloning { mixing } => entanglement_cloning(signal, mixing),
            EveStrategy::PhotonNumberSplitting => Ok(photon_number_splitting(signal, ctx, rng)),
            EveStrategy::Collective { coupling } => collective(signal, coupling),
        }
    }
}

/// Probability that a non-empty Poisson pulse of mean `mu` holds two or more photons.
pub fn multi_photon_probability(mu: f64) -> f64 {
    if mu <= 0.0 {
        return 0.0;
    }
    let e = (-mu).exp();
    utils::clamp_probability((1.0 - e - mu * e) / (1.0 - e))
}

fn apply_channel(signal: Signal, channel: &KrausChannel) -> Signal {
    match signal {
        Signal::Qubit(state) => Signal::Qubit(channel.apply(&state)),
        Signal::Pair(pair) => Signal::Pair(channel.apply_to(&pair, Subsystem::B)),
    }
}

fn intercept_resend<R: Rng + ?Sized>(
    signal: Signal,
    ctx: &AttackContext,
    rng: &mut R,
) -> EveAttackResult {
    let bases = ctx.protocol.eavesdropper_bases();
    let eve_basis = *bases.choose(rng).unwrap_or(&0.0);

    let (outcome, state_after) = match signal {
        Signal::Qubit(state) => {
            let (res, _) = state.measure_in_basis(eve_basis, rng);
            let resent = DensityMatrix::basis_state(eve_basis, res.bit());
            (res.bit(), Signal::Qubit(resent))
        }
        // The collapsed pair is exactly what a resent eigenstate produces.
        Signal::Pair(pair) => {
            let (res, post) = pair.measure_subsystem(Subsystem::B, eve_basis, rng);
            (res.bit(), Signal::Pair(post))
        }
    };

    // B92 encodes bit 1 as |+>, so an X-basis "minus" points to bit 0.
    let eve_bit = match ctx.protocol {
        Protocol::B92 if eve_basis.abs() > BASIS_TOLERANCE => !outcome,
        _ => outcome,
    };

    let offset = ctx.alice_basis - eve_basis;
    let knowledge = offset.cos().powi(2);
    EveAttackResult {
        eve_bit: Some(eve_bit),
        eve_knowledge: knowledge,
        disturbance: offset.sin().powi(2) / 2.0,
        mutual_information: 1.0 - binary_entropy((offset / 2.0).sin().powi(2)),
        state_after: Some(state_after),
    }
}

fn beam_splitting<R: Rng + ?Sized>(
    signal: Signal,
    ctx: &AttackContext,
    tap_ratio: f64,
    rng: &mut R,
) -> EveAttackResult {
    if !utils::bernoulli(rng, tap_ratio) {
        return EveAttackResult::untouched(signal);
    }
    EveAttackResult {
        eve_bit: ctx.alice_bit,
        eve_knowledge: 1.0,
        disturbance: 0.0,
        mutual_information: 1.0,
        state_after: None,
    }
}

fn optimal_cloning<R: Rng + ?Sized>(
    signal: Signal,
    ctx: &AttackContext,
    rng: &mut R,
) -> Result<EveAttackResult, StateError> {
    // depolarizing(1/3) shrinks the Bloch vector to 2/3: fidelity 5/6
    let channel = KrausChannel::depolarizing(1.0 / 3.0)?;
    let eve_bit = ctx
        .alice_bit
        .map(|bit| bit ^ utils::bernoulli(rng, CLONING_DISTURBANCE));

    Ok(EveAttackResult {
        eve_bit,
        eve_knowledge: 1.0 - CLONING_DISTURBANCE,
        disturbance: CLONING_DISTURBANCE,
        mutual_information: 1.0 - binary_entropy(CLONING_DISTURBANCE),
        state_after: Some(apply_channel(signal, &channel)),
    })
}

fn entanglement_cloning(signal: Signal, mixing: f64) -> Result<EveAttackResult, StateError> {
    let state_after = match signal {
        Signal::Pair(pair) => Signal::Pair(pair.mix_with_white_noise(mixing)),
        qubit @ Signal::Qubit(_) => apply_channel(qubit, &KrausChannel::depolarizing(mixing)?),
    };
    let disturbance = mixing / 2.0;
    let information = binary_entropy(disturbance);

    Ok(EveAttackResult {
        eve_bit: None,
        eve_knowledge: information,
        disturbance,
        mutual_information: information,
        state_after: Some(state_after),
    })
}

fn photon_number_splitting<R: Rng + ?Sized>(
    signal: Signal,
    ctx: &AttackContext,
    rng: &mut R,
) -> EveAttackResult {
    if utils::bernoulli(rng, multi_photon_probability(ctx.mean_photon_number)) {
        return EveAttackResult {
            eve_bit: ctx.alice_bit,
            eve_knowledge: 1.0,
            disturbance: 0.0,
            mutual_information: 1.0,
            state_after: Some(signal),
        };
    }
    // single photon: blocked, nothing learned
    EveAttackResult {
        state_after: None,
        ..EveAttackResult::untouched(signal)
    }
}

fn collective(signal: Signal, coupling: f64) -> Result<EveAttackResult, StateError> {
    let flip = coupling * COLLECTIVE_MAX_DISTURBANCE;
    let channel = KrausChannel::pauli(flip, 0.0, flip)?;
    let information = binary_entropy(flip);

    Ok(EveAttackResult {
        eve_bit: None,
        eve_knowledge: information,
        disturbance: flip,
        mutual_information: information,
        state_after: Some(apply_channel(signal, &channel)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BellState, BipartiteDensityMatrix};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::f64::consts::FRAC_PI_2;

    fn b92_ctx(bit: bool) -> AttackContext {
        AttackContext {
            alice_bit: Some(bit),
            alice_basis: if bit { FRAC_PI_2 } else { 0.0 },
            protocol: Protocol::B92,
            mean_photon_number: 0.1,
        }
    }

    #[test]
    fn intercept_resend_reports_basis_dependent_disturbance() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        for _ in 0..50 {
            let res = EveStrategy::InterceptResend
                .attack(Signal::Qubit(DensityMatrix::zero()), &b92_ctx(false), &mut rng)
                .unwrap();
            assert!(res.disturbance.abs() < 1e-12 || (res.disturbance - 0.5).abs() < 1e-12);
            assert!(res.state_after.is_some());
        }
    }

    #[test]
    fn cloning_figures_of_merit() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let res = EveStrategy::OptimalCloning
            .attack(Signal::Qubit(DensityMatrix::zero()), &b92_ctx(false), &mut rng)
            .unwrap();
        assert!((res.disturbance - 1.0 / 6.0).abs() < 1e-12);
        assert!((res.mutual_information - (1.0 - binary_entropy(1.0 / 6.0))).abs() < 1e-12);
        let Some(Signal::Qubit(after)) = res.state_after else {
            panic!("cloning must return a qubit");
        };
        assert!((after.entry(1, 1).re - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn pns_on_multi_photon_pulses_is_invisible() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        for bit in [false, true] {
            let ctx = AttackContext {
                mean_photon_number: 20.0,
                ..b92_ctx(bit)
            };
            for _ in 0..100 {
                let signal = Signal::Qubit(DensityMatrix::basis_state(ctx.alice_basis, bit));
                let res = EveStrategy::PhotonNumberSplitting
                    .attack(signal.clone(), &ctx, &mut rng)
                    .unwrap();
                assert_eq!(res.disturbance, 0.0);
                assert_eq!(res.mutual_information, 1.0);
                assert_eq!(res.eve_bit, Some(bit));
                assert_eq!(res.state_after, Some(signal));
            }
        }
    }

    #[test]
    fn pns_blocks_single_photon_pulses() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let ctx = AttackContext {
            mean_photon_number: 1e-6,
            ..b92_ctx(false)
        };
        for _ in 0..100 {
            let res = EveStrategy::PhotonNumberSplitting
                .attack(Signal::Qubit(DensityMatrix::zero()), &ctx, &mut rng)
                .unwrap();
            assert!(res.state_after.is_none());
            assert_eq!(res.eve_bit, None);
            assert_eq!(res.mutual_information, 0.0);
        }
    }

    #[test]
    fn entanglement_cloning_produces_werner_state() {
        let ctx = AttackContext {
            alice_bit: None,
            alice_basis: std::f64::consts::FRAC_PI_4,
            protocol: Protocol::E91,
            mean_photon_number: 0.1,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let bell = BipartiteDensityMatrix::bell(BellState::PhiPlus);
        let res = EveStrategy::EntanglementCloning { mixing: 0.3 }
            .attack(Signal::Pair(bell), &ctx, &mut rng)
            .unwrap();
        let expected = BipartiteDensityMatrix::werner(BellState::PhiPlus, 0.3).unwrap();
        assert_eq!(res.state_after, Some(Signal::Pair(expected)));
        assert!((res.disturbance - 0.15).abs() < 1e-12);
    }

    #[test]
    fn full_tap_removes_every_photon() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let res = EveStrategy::BeamSplitting { tap_ratio: 1.0 }
            .attack(Signal::Qubit(DensityMatrix::plus()), &b92_ctx(true), &mut rng)
            .unwrap();
        assert!(res.state_after.is_none());
        assert_eq!(res.eve_bit, Some(true));
        assert_eq!(res.disturbance, 0.0);
    }

    #[test]
    fn multi_photon_fraction_for_weak_pulses() {
        let p = multi_photon_probability(0.1);
        assert!(p > 0.04 && p < 0.06);
        assert_eq!(multi_photon_probability(0.0), 0.0);
    }

    #[test]
    fn collective_disturbance_scales_with_coupling() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let res = EveStrategy::Collective { coupling: 1.0 }
            .attack(Signal::Qubit(DensityMatrix::zero()), &b92_ctx(false), &mut rng)
            .unwrap();
        assert!((res.disturbance - COLLECTIVE_MAX_DISTURBANCE).abs() < 1e-12);
        assert_eq!(res.eve_bit, None);
    }
}
