//! Optical fiber: Beer-Lambert loss followed by length-dependent noise.

use crate::core::errors::ChannelError;
use crate::core::utils::{self, clamp_probability};
use crate::core::{BipartiteDensityMatrix, DensityMatrix, KrausChannel, Subsystem};
use crate::physical::ChannelParameters;
use ndarray::Array2;
use num_complex::Complex64;
use rand::Rng;
use serde::Serialize;

/// Reference temperature for the phase-damping budget.
pub const ROOM_TEMPERATURE_K: f64 = 293.15;

/// Probabilities of each noise process for one pass through the fiber.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiberNoise {
    pub depolarizing: f64,
    pub phase_damping: f64,
    pub pmd_bit_flip: f64,
    pub misalignment: f64,
}

impl FiberNoise {
    pub fn from_params(params: &ChannelParameters) -> Self {
        let length = params.fiber_length_km();
        Self {
            depolarizing: clamp_probability(1e-3 * length),
            phase_damping: clamp_probability(
                5e-4 * length * (params.temperature_k() / ROOM_TEMPERATURE_K),
            ),
            pmd_bit_flip: clamp_probability(
                2e-3 * length.sqrt() * (1550.0 / params.wavelength_nm()),
            ),
            misalignment: params.misalignment_error(),
        }
    }

    /// Composite channel in physical order.
    pub fn channel(&self) -> Result<KrausChannel, ChannelError> {
        Ok(KrausChannel::depolarizing(self.depolarizing)?
            .compose(&KrausChannel::phase_damping(self.phase_damping)?)
            .compose(&KrausChannel::bit_flip(self.pmd_bit_flip)?)
            .compose(&KrausChannel::bit_flip(self.misalignment)?))
    }
}

/// Fiber link between the source and Bob.
#[derive(Debug, Clone)]
pub struct FiberChannel {
    transmittance: f64,
    noise: FiberNoise,
    channel: KrausChannel,
    // I ⊗ K for every composite Kraus operator
    pair_ops: Vec<Array2<Complex64>>,
}

impl FiberChannel {
    pub fn new(params: &ChannelParameters) -> Result<Self, ChannelError> {
        let noise = FiberNoise::from_params(params);
        let channel = noise.channel()?;
        let pair_ops = channel.expanded(Subsystem::B);
        Ok(Self {
            transmittance: clamp_probability(params.transmittance()),
            noise,
            channel,
            pair_ops,
        })
    }

    pub fn transmittance(&self) -> f64 {
        self.transmittance
    }

    pub fn loss_probability(&self) -> f64 {
        1.0 - self.transmittance
    }

    pub fn noise(&self) -> &FiberNoise {
        &self.noise
    }

    pub fn channel(&self) -> &KrausChannel {
        &self.channel
    }

    /// Noise only, no loss.
    pub fn apply_noise(&self, state: &DensityMatrix) -> DensityMatrix {
        self.channel.apply(state)
    }

    /// Noise on Bob's half of a pair, no loss.
    pub fn apply_noise_to_pair(&self, state: &BipartiteDensityMatrix) -> BipartiteDensityMatrix {
        state.apply_lifted_kraus(&self.pair_ops)
    }

    /// Sends one photon. `None` when it is absorbed.
    pub fn transmit<R: Rng + ?Sized>(
        &self,
        state: &DensityMatrix,
        rng: &mut R,
    ) -> Option<DensityMatrix> {
        if utils::bernoulli(rng, self.loss_probability()) {
            return None;
        }
        Some(self.apply_noise(state))
    }

    /// Sends Bob's photon of an entangled pair. Alice's half stays at the source.
    pub fn transmit_pair<R: Rng + ?Sized>(
        &self,
        state: &BipartiteDensityMatrix,
        rng: &mut R,
    ) -> Option<BipartiteDensityMatrix> {
        if utils::bernoulli(rng, self.loss_probability()) {
            return None;
        }
        Some(self.apply_noise_to_pair(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BellState;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn noise_budget_scales_with_length() {
        let p = ChannelParameters::builder()
            .fiber_length_km(25.0)
            .build()
            .unwrap();
        let n = FiberNoise::from_params(&p);
        assert!((n.depolarizing - 0.025).abs() < 1e-12);
        assert!((n.phase_damping - 0.0125).abs() < 1e-12);
        assert!((n.pmd_bit_flip - 0.01).abs() < 1e-12);
    }

    #[test]
    fn ideal_fiber_never_loses() {
        let fiber = FiberChannel::new(&ChannelParameters::ideal()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(fiber.transmit(&DensityMatrix::plus(), &mut rng).is_some());
        }
    }

    #[test]
    fn outputs_keep_density_matrix_invariants() {
        let p = ChannelParameters::builder()
            .fiber_length_km(80.0)
            .build()
            .unwrap();
        let fiber = FiberChannel::new(&p).unwrap();
        assert!(utils::check_completeness(fiber.channel().kraus_operators(), 2));
        for s in [DensityMatrix::zero(), DensityMatrix::minus()] {
            assert!(fiber.apply_noise(&s).is_valid().is_ok());
        }
        let pair = fiber.apply_noise_to_pair(&BipartiteDensityMatrix::bell(BellState::PhiPlus));
        assert!(pair.is_valid().is_ok());
    }

    #[test]
    fn long_fiber_loses_most_photons() {
        let p = ChannelParameters::builder()
            .fiber_length_km(100.0)
            .build()
            .unwrap();
        let fiber = FiberChannel::new(&p).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let arrived = (0..10_000)
            .filter(|_| fiber.transmit(&DensityMatrix::zero(), &mut rng).is_some())
            .count();
        // T = 0.01
        assert!(arrived < 200);
    }
}
