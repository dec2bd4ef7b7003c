//! Eavesdropping strategies.
//!
//! An attack acts on one signal at a time. Whether Eve touches a signal at all
//! is decided once per signal by [`EveAttackConfig::intercepts`]; the strategy
//! itself never sees the signals she lets through.

mod attacks;

pub use attacks::{COLLECTIVE_MAX_DISTURBANCE, EveStrategy, multi_photon_probability};

use crate::core::errors::ConfigError;
use crate::core::utils;
use crate::core::{BipartiteDensityMatrix, DensityMatrix};
use crate::physical::unit_interval;
use crate::protocols::Protocol;
use rand::Rng;
use serde::Serialize;
use std::fmt;

/// Default beam-splitter tap ratio.
pub const DEFAULT_TAP_RATIO: f64 = 0.5;
/// Default Werner weight of the entangling cloner.
pub const DEFAULT_ENTANGLEMENT_MIXING: f64 = 1.0 / 3.0;
/// Default coupling of the collective probe.
pub const DEFAULT_COLLECTIVE_COUPLING: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttackKind {
    InterceptResend,
    BeamSplitting,
    OptimalCloning,
    EntanglementCloning,
    PhotonNumberSplitting,
    Collective,
}

impl AttackKind {
    pub const ALL: [AttackKind; 6] = [
        AttackKind::InterceptResend,
        AttackKind::BeamSplitting,
        AttackKind::OptimalCloning,
        AttackKind::EntanglementCloning,
        AttackKind::PhotonNumberSplitting,
        AttackKind::Collective,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AttackKind::InterceptResend => "intercept-resend",
            AttackKind::BeamSplitting => "beam-splitting",
            AttackKind::OptimalCloning => "optimal cloning",
            AttackKind::EntanglementCloning => "entanglement cloning",
            AttackKind::PhotonNumberSplitting => "photon-number splitting",
            AttackKind::Collective => "collective",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Eve's configuration for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EveAttackConfig {
    kind: AttackKind,
    interception_probability: f64,
    coupling_strength: Option<f64>,
}

impl EveAttackConfig {
    pub fn new(kind: AttackKind, interception_probability: f64) -> Result<Self, ConfigError> {
        unit_interval("interception_probability", interception_probability)?;
        Ok(Self {
            kind,
            interception_probability,
            coupling_strength: None,
        })
    }

    /// Tap ratio, Werner weight or probe coupling, depending on the attack.
    pub fn with_coupling_strength(mut self, coupling: f64) -> Result<Self, ConfigError> {
        unit_interval("coupling_strength", coupling)?;
        self.coupling_strength = Some(coupling);
        Ok(self)
    }

    /// Same attack with another interception probability.
    pub fn with_interception_probability(mut self, probability: f64) -> Result<Self, ConfigError> {
        unit_interval("interception_probability", probability)?;
        self.interception_probability = probability;
        Ok(self)
    }

    pub fn kind(&self) -> AttackKind {
        self.kind
    }

    pub fn interception_probability(&self) -> f64 {
        self.interception_probability
    }

    pub fn coupling_strength(&self) -> Option<f64> {
        self.coupling_strength
    }

    /// True when the attack can touch at least some signals.
    pub fn is_active(&self) -> bool {
        self.interception_probability > 0.0
    }

    /// Bernoulli gate applied once per signal.
    pub fn intercepts<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        utils::bernoulli(rng, self.interception_probability)
    }

    pub fn strategy(&self) -> EveStrategy {
        let coupling = |default: f64| self.coupling_strength.unwrap_or(default);
        match self.kind {
            AttackKind::InterceptResend => EveStrategy::InterceptResend,
            AttackKind::BeamSplitting => EveStrategy::BeamSplitting {
                tap_ratio: coupling(DEFAULT_TAP_RATIO),
            },
            AttackKind::OptimalCloning => EveStrategy::OptimalCloning,
            AttackKind::EntanglementCloning => EveStrategy::EntanglementCloning {
                mixing: coupling(DEFAULT_ENTANGLEMENT_MIXING),
            },
            AttackKind::PhotonNumberSplitting => EveStrategy::PhotonNumberSplitting,
            AttackKind::Collective => EveStrategy::Collective {
                coupling: coupling(DEFAULT_COLLECTIVE_COUPLING),
            },
        }
    }
}

/// A signal in flight: a single photon (B92) or an entangled pair (E91).
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Qubit(DensityMatrix),
    Pair(BipartiteDensityMatrix),
}

/// What Eve knows about the signal she attacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackContext {
    /// Alice's key bit, when it is fixed before transmission.
    pub alice_bit: Option<bool>,
    /// Bloch angle of Alice's preparation or measurement basis.
    pub alice_basis: f64,
    pub protocol: Protocol,
    /// Mean photon number of the weak coherent source.
    pub mean_photon_number: f64,
}

/// Outcome of one attack.
#[derive(Debug, Clone, PartialEq)]
pub struct EveAttackResult {
    /// Eve's guess of Alice's bit, if she formed one.
    pub eve_bit: Option<bool>,
    pub eve_knowledge: f64,
    /// Probability that the attack flips Bob's sifted bit.
    pub disturbance: f64,
    /// Mutual information with Alice's bit, in bits.
    pub mutual_information: f64,
    /// `None` when Eve removed the signal from the channel.
    pub state_after: Option<Signal>,
}

impl EveAttackResult {
    /// The signal passes through unchanged and Eve learns nothing.
    pub fn untouched(signal: Signal) -> Self {
        Self {
            eve_bit: None,
            eve_knowledge: 0.0,
            disturbance: 0.0,
            mutual_information: 0.0,
            state_after: Some(signal),
        }
    }
}
