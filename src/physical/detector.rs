use crate::core::utils;
use crate::physical::ChannelParameters;
use rand::Rng;
use serde::Serialize;

/// What a single-photon detector reports for one timing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetectorEvent {
    /// The photon was registered; the caller measures the state.
    Signal,
    /// A thermal click with a uniformly random bit.
    DarkCount(bool),
    Silent,
}

/// Threshold detector with finite efficiency and dark counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detector {
    efficiency: f64,
    dark_count_probability: f64,
}

impl Detector {
    pub fn new(params: &ChannelParameters) -> Self {
        Self {
            efficiency: params.detector_efficiency(),
            dark_count_probability: utils::clamp_probability(params.dark_count_probability()),
        }
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn dark_count_probability(&self) -> f64 {
        self.dark_count_probability
    }

    /// Probability that a window with an arriving photon produces any click.
    pub fn click_probability(&self) -> f64 {
        self.efficiency + (1.0 - self.efficiency) * self.dark_count_probability
    }

    /// Samples the detector for one window. A missed photon can still be
    /// followed by a dark count.
    pub fn detect<R: Rng + ?Sized>(&self, photon_arrived: bool, rng: &mut R) -> DetectorEvent {
        if photon_arrived && utils::bernoulli(rng, self.efficiency) {
            return DetectorEvent::Signal;
        }
        if utils::bernoulli(rng, self.dark_count_probability) {
            return DetectorEvent::DarkCount(rng.random_bool(0.5));
        }
        DetectorEvent::Silent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn perfect_detector_always_registers() {
        let d = Detector::new(&ChannelParameters::ideal());
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        for _ in 0..100 {
            assert_eq!(d.detect(true, &mut rng), DetectorEvent::Signal);
            assert_eq!(d.detect(false, &mut rng), DetectorEvent::Silent);
        }
    }

    #[test]
    fn dark_counts_fire_without_photon() {
        let p = ChannelParameters::builder()
            .dark_count_rate_hz(5e8)
            .timing_window_ns(1.0)
            .build()
            .unwrap();
        let d = Detector::new(&p);
        assert!((d.dark_count_probability() - 0.5).abs() < 1e-12);
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let clicks = (0..4000)
            .filter(|_| matches!(d.detect(false, &mut rng), DetectorEvent::DarkCount(_)))
            .count();
        assert!((clicks as f64 / 4000.0 - 0.5).abs() < 0.05);
    }
}
