use crate::core::errors::ConfigError;
use serde::Serialize;

/// Physical description of the link between Alice and Bob.
///
/// Immutable once built; use [`ChannelParameters::builder`] to change fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelParameters {
    fiber_length_km: f64,
    wavelength_nm: f64,
    attenuation_db_per_km: f64,
    temperature_k: f64,
    detector_efficiency: f64,
    dark_count_rate_hz: f64,
    timing_window_ns: f64,
    misalignment_error: f64,
    mean_photon_number: f64,
}

impl Default for ChannelParameters {
    fn default() -> Self {
        Self {
            fiber_length_km: 10.0,
            wavelength_nm: 1550.0,
            attenuation_db_per_km: 0.2,
            temperature_k: 293.15,
            detector_efficiency: 0.9,
            dark_count_rate_hz: 100.0,
            timing_window_ns: 1.0,
            misalignment_error: 0.005,
            mean_photon_number: 0.1,
        }
    }
}

impl ChannelParameters {
    pub fn builder() -> ChannelParametersBuilder {
        ChannelParametersBuilder {
            params: Self::default(),
        }
    }

    /// Zero-length fiber, perfect detector, no dark counts. The misalignment
    /// floor keeps its default.
    pub fn ideal() -> Self {
        Self {
            fiber_length_km: 0.0,
            detector_efficiency: 1.0,
            dark_count_rate_hz: 0.0,
            ..Self::default()
        }
    }

    /// Starts a builder from these values.
    pub fn to_builder(&self) -> ChannelParametersBuilder {
        ChannelParametersBuilder { params: *self }
    }

    pub fn fiber_length_km(&self) -> f64 {
        self.fiber_length_km
    }

    pub fn wavelength_nm(&self) -> f64 {
        self.wavelength_nm
    }

    pub fn attenuation_db_per_km(&self) -> f64 {
        self.attenuation_db_per_km
    }

    pub fn temperature_k(&self) -> f64 {
        self.temperature_k
    }

    pub fn detector_efficiency(&self) -> f64 {
        self.detector_efficiency
    }

    pub fn dark_count_rate_hz(&self) -> f64 {
        self.dark_count_rate_hz
    }

    pub fn timing_window_ns(&self) -> f64 {
        self.timing_window_ns
    }

    pub fn misalignment_error(&self) -> f64 {
        self.misalignment_error
    }

    pub fn mean_photon_number(&self) -> f64 {
        self.mean_photon_number
    }

    /// Probability that a detector fires in one timing window with no photon.
    pub fn dark_count_probability(&self) -> f64 {
        self.dark_count_rate_hz * self.timing_window_ns * 1e-9
    }

    /// Beer-Lambert transmittance $10^{-\alpha L / 10}$.
    pub fn transmittance(&self) -> f64 {
        10f64.powf(-self.attenuation_db_per_km * self.fiber_length_km / 10.0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("fiber_length_km", self.fiber_length_km)?;
        positive("wavelength_nm", self.wavelength_nm)?;
        non_negative("attenuation_db_per_km", self.attenuation_db_per_km)?;
        positive("temperature_k", self.temperature_k)?;
        unit_interval("detector_efficiency", self.detector_efficiency)?;
        non_negative("dark_count_rate_hz", self.dark_count_rate_hz)?;
        positive("timing_window_ns", self.timing_window_ns)?;
        if !(0.0..=0.5).contains(&self.misalignment_error) {
            return Err(ConfigError::OutOfRange {
                parameter: "misalignment_error",
                value: self.misalignment_error,
                expected: "a probability in [0, 0.5]",
            });
        }
        positive("mean_photon_number", self.mean_photon_number)?;

        let dark = self.dark_count_probability();
        if dark > 1.0 {
            return Err(ConfigError::OutOfRange {
                parameter: "dark_count_rate_hz * timing_window_ns",
                value: dark,
                expected: "a dark-count probability per window of at most 1",
            });
        }
        Ok(())
    }
}

/// Builder for [`ChannelParameters`]; unset fields keep their defaults.
#[derive(Debug, Clone)]
pub struct ChannelParametersBuilder {
    params: ChannelParameters,
}

impl ChannelParametersBuilder {
    pub fn fiber_length_km(mut self, value: f64) -> Self {
        self.params.fiber_length_km = value;
        self
    }

    pub fn wavelength_nm(mut self, value: f64) -> Self {
        self.params.wavelength_nm = value;
        self
    }

    pub fn attenuation_db_per_km(mut self, value: f64) -> Self {
        self.params.attenuation_db_per_km = value;
        self
    }

    pub fn temperature_k(mut self, value: f64) -> Self {
        self.params.temperature_k = value;
        self
    }

    pub fn detector_efficiency(mut self, value: f64) -> Self {
        self.params.detector_efficiency = value;
        self
    }

    pub fn dark_count_rate_hz(mut self, value: f64) -> Self {
        self.params.dark_count_rate_hz = value;
        self
    }

    pub fn timing_window_ns(mut self, value: f64) -> Self {
        self.params.timing_window_ns = value;
        self
    }

    pub fn misalignment_error(mut self, value: f64) -> Self {
        self.params.misalignment_error = value;
        self
    }

    pub fn mean_photon_number(mut self, value: f64) -> Self {
        self.params.mean_photon_number = value;
        self
    }

    /// Validates every field. Values are never clamped.
    pub fn build(self) -> Result<ChannelParameters, ConfigError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

fn non_negative(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            parameter,
            value,
            expected: "a finite value >= 0",
        })
    }
}

fn positive(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            parameter,
            value,
            expected: "a finite value > 0",
        })
    }
}

pub(crate) fn unit_interval(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            parameter,
            value,
            expected: "a probability in [0, 1]",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ChannelParameters::default().validate().is_ok());
        assert!(ChannelParameters::ideal().validate().is_ok());
    }

    #[test]
    fn rejects_negative_length() {
        let err = ChannelParameters::builder()
            .fiber_length_km(-1.0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                parameter: "fiber_length_km",
                ..
            }
        ));
    }

    #[test]
    fn rejects_efficiency_above_one() {
        assert!(
            ChannelParameters::builder()
                .detector_efficiency(1.2)
                .build()
                .is_err()
        );
    }

    #[test]
    fn rejects_dark_probability_above_one() {
        assert!(
            ChannelParameters::builder()
                .dark_count_rate_hz(1e9)
                .timing_window_ns(2.0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn transmittance_follows_beer_lambert() {
        let p = ChannelParameters::builder()
            .fiber_length_km(50.0)
            .build()
            .unwrap();
        assert!((p.transmittance() - 0.1).abs() < 1e-12);
        assert!((ChannelParameters::ideal().transmittance() - 1.0).abs() < 1e-12);
    }
}
