//! Physical layer: channel parameters, the optical fiber and Bob's detectors.

mod detector;
mod fiber;
mod params;

pub use detector::{Detector, DetectorEvent};
pub use fiber::{FiberChannel, FiberNoise, ROOM_TEMPERATURE_K};
pub use params::{ChannelParameters, ChannelParametersBuilder};
pub(crate) use params::unit_interval;
