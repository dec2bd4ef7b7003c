use crate::core::bipartite::{BipartiteDensityMatrix, Subsystem};
use crate::core::errors::ChannelError;
use crate::core::state::DensityMatrix;
use crate::core::utils;
use ndarray::{Array2, array};
use num_complex::Complex64;

/// Single-qubit noise channel in Kraus form, $\rho \mapsto \sum_k K_k \rho K_k^\dagger$.
#[derive(Clone, Debug)]
pub struct KrausChannel {
    kraus_ops: Vec<Array2<Complex64>>,
}

impl KrausChannel {
    pub fn new(kraus_ops: Vec<Array2<Complex64>>) -> Result<Self, ChannelError> {
        if kraus_ops.is_empty() {
            return Err(ChannelError::Empty);
        }

        if kraus_ops.iter().any(|op| op.dim() != (2, 2)) {
            return Err(ChannelError::InvalidDimensions);
        }

        if !utils::check_completeness(&kraus_ops, 2) {
            return Err(ChannelError::NotComplete);
        }

        Ok(Self { kraus_ops })
    }

    pub fn kraus_operators(&self) -> &[Array2<Complex64>] {
        &self.kraus_ops
    }

    pub fn apply(&self, state: &DensityMatrix) -> DensityMatrix {
        state.apply_kraus(&self.kraus_ops)
    }

    /// Applies the channel to one half of a two-qubit state.
    pub fn apply_to(
        &self,
        state: &BipartiteDensityMatrix,
        subsystem: Subsystem,
    ) -> BipartiteDensityMatrix {
        state.apply_local_kraus(subsystem, &self.kraus_ops)
    }

    /// The 4x4 operators `K ⊗ I` or `I ⊗ K`.
    pub fn expanded(&self, subsystem: Subsystem) -> Vec<Array2<Complex64>> {
        self.kraus_ops.iter().map(|k| subsystem.lift(k)).collect()
    }

    /// `other ∘ self`: first `self`, then `other`.
    pub fn compose(&self, other: &KrausChannel) -> KrausChannel {
        let new_ops: Vec<_> = other
            .kraus_ops
            .iter()
            .flat_map(|op_b| self.kraus_ops.iter().map(move |op_a| op_b.dot(op_a)))
            .collect();

        KrausChannel { kraus_ops: new_ops }
    }

    /// Identity channel
    pub fn identity() -> KrausChannel {
        KrausChannel {
            kraus_ops: vec![Array2::eye(2)],
        }
    }

    /// Bit Flip Channel -> X
    pub fn bit_flip(p: f64) -> Result<KrausChannel, ChannelError> {
        Self::pauli(p, 0.0, 0.0)
    }

    /// Phase Flip Channel -> Z
    pub fn phase_flip(p: f64) -> Result<KrausChannel, ChannelError> {
        Self::pauli(0.0, 0.0, p)
    }

    /// Bit-Phase Flip Channel -> Y
    pub fn bit_phase_flip(p: f64) -> Result<KrausChannel, ChannelError> {
        Self::pauli(0.0, p, 0.0)
    }

    /// Depolarizing channel: $(1-p)\rho + p\,I/2$.
    pub fn depolarizing(p: f64) -> Result<KrausChannel, ChannelError> {
        validate_prob(p)?;
        let w = p / 4.0;
        Self::pauli(w, w, w)
    }

    /// Pauli channel applying X, Y, Z with the given probabilities.
    /// Zero-weight operators are dropped.
    pub fn pauli(px: f64, py: f64, pz: f64) -> Result<KrausChannel, ChannelError> {
        validate_prob(px)?;
        validate_prob(py)?;
        validate_prob(pz)?;
        let p_id = 1.0 - px - py - pz;
        if p_id < -1e-12 {
            return Err(ChannelError::InvalidProbability(px + py + pz));
        }

        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);
        let i = Complex64::new(0.0, 1.0);
        let weighted = [
            (p_id.max(0.0), array![[one, zero], [zero, one]]),
            (px, array![[zero, one], [one, zero]]),
            (py, array![[zero, -i], [i, zero]]),
            (pz, array![[one, zero], [zero, -one]]),
        ];

        let ops: Vec<_> = weighted
            .into_iter()
            .filter(|(w, _)| *w > 0.0)
            .map(|(w, op)| op.mapv(|x| x * w.sqrt()))
            .collect();

        if ops.is_empty() {
            return Ok(Self::identity());
        }
        KrausChannel::new(ops)
    }

    /// Amplitude Damping -> T1 relaxation
    pub fn amplitude_damping(gamma: f64) -> Result<KrausChannel, ChannelError> {
        validate_prob(gamma)?;

        let g_sqrt = gamma.sqrt();
        let one_minus_g_sqrt = (1.0 - gamma).sqrt();

        let k0 = array![
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [
                Complex64::new(0.0, 0.0),
                Complex64::new(one_minus_g_sqrt, 0.0)
            ]
        ];

        let k1 = array![
            [Complex64::new(0.0, 0.0), Complex64::new(g_sqrt, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)]
        ];

        KrausChannel::new(vec![k0, k1])
    }

    /// Phase Damping -> T2 relaxation
    pub fn phase_damping(lambda: f64) -> Result<KrausChannel, ChannelError> {
        validate_prob(lambda)?;

        let sqrt_one_minus_lambda = (1.0 - lambda).sqrt();
        let sqrt_lambda = lambda.sqrt();

        let k0 = array![
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [
                Complex64::new(0.0, 0.0),
                Complex64::new(sqrt_one_minus_lambda, 0.0)
            ]
        ];

        let k1 = array![
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(sqrt_lambda, 0.0)]
        ];

        KrausChannel::new(vec![k0, k1])
    }
}

/// Validate probability parameter
pub(crate) fn validate_prob(p: f64) -> Result<(), ChannelError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(ChannelError::InvalidProbability(p));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_channels() -> Vec<KrausChannel> {
        vec![
            KrausChannel::identity(),
            KrausChannel::bit_flip(0.1).unwrap(),
            KrausChannel::phase_flip(0.2).unwrap(),
            KrausChannel::bit_phase_flip(0.3).unwrap(),
            KrausChannel::depolarizing(0.4).unwrap(),
            KrausChannel::amplitude_damping(0.25).unwrap(),
            KrausChannel::phase_damping(0.6).unwrap(),
            KrausChannel::pauli(0.1, 0.0, 0.1).unwrap(),
        ]
    }

    #[test]
    fn kraus_sets_are_complete() {
        for ch in all_channels() {
            assert!(utils::check_completeness(ch.kraus_operators(), 2));
        }
    }

    #[test]
    fn composition_stays_complete() {
        let ch = KrausChannel::depolarizing(0.01)
            .unwrap()
            .compose(&KrausChannel::phase_damping(0.02).unwrap())
            .compose(&KrausChannel::bit_flip(0.005).unwrap());
        assert!(utils::check_completeness(ch.kraus_operators(), 2));
    }

    #[test]
    fn channels_preserve_trace_and_hermiticity() {
        let rho = DensityMatrix::from_bloch(0.3, 0.2, -0.6).unwrap();
        for ch in all_channels() {
            let out = ch.apply(&rho);
            assert!(out.is_valid().is_ok());
        }
    }

    #[test]
    fn depolarizing_shrinks_bloch_vector() {
        let out = KrausChannel::depolarizing(1.0 / 3.0)
            .unwrap()
            .apply(&DensityMatrix::zero());
        let [_, _, z] = out.bloch_vector();
        assert!((z - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn bit_flip_on_zero_populates_one() {
        let out = KrausChannel::bit_flip(0.25)
            .unwrap()
            .apply(&DensityMatrix::zero());
        assert!((out.entry(1, 1).re - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_probabilities() {
        assert_eq!(
            KrausChannel::bit_flip(1.5).unwrap_err(),
            ChannelError::InvalidProbability(1.5)
        );
        assert!(KrausChannel::pauli(0.5, 0.4, 0.3).is_err());
    }

    #[test]
    fn expanded_operators_are_complete_on_pair() {
        let ch = KrausChannel::amplitude_damping(0.3).unwrap();
        for sub in [Subsystem::A, Subsystem::B] {
            assert!(utils::check_completeness(&ch.expanded(sub), 4));
        }
    }
}
