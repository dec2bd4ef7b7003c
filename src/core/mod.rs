mod bipartite;
mod channels;
pub mod errors;
mod gates;
mod measurements;
mod state;
pub mod utils;

pub use bipartite::{BellState, BipartiteDensityMatrix, Subsystem};
pub use channels::KrausChannel;
pub(crate) use channels::validate_prob;
pub use gates::Gate;
pub use measurements::{Measurement, MeasurementResult};
pub use state::{DensityMatrix, TOLERANCE};
