mod core;
pub mod eavesdropper;
pub mod physical;
pub mod postprocessing;
pub mod protocols;
pub mod rng;
pub mod simulation;

pub use crate::core::{
    BellState, BipartiteDensityMatrix, DensityMatrix, Gate, KrausChannel, Measurement,
    MeasurementResult, Subsystem, TOLERANCE, errors, utils,
};
pub use crate::eavesdropper::{AttackKind, EveAttackConfig, EveAttackResult};
pub use crate::physical::{ChannelParameters, Detector, FiberChannel};
pub use crate::postprocessing::{PostProcessingConfig, PostProcessingResult, post_process};
pub use crate::protocols::Protocol;
pub use crate::simulation::{
    SecurityVerdict, SimulationConfig, SimulationReport, SimulationResult,
    generate_simulation_report, run_qkd_simulation,
};
