//! End-to-end simulation facade.
//!
//! [`run_qkd_simulation`] routes a [`SimulationConfig`] to the B92 or E91
//! engine, post-processes the sifted key and derives the security analysis.

pub mod analysis;
pub mod report;
pub mod sweeps;

pub use analysis::{SecurityAnalysis, SecurityVerdict};
pub use report::{SimulationReport, generate_simulation_report};
pub use sweeps::{
    DistancePoint, EavesdroppingPoint, ProtocolComparison, ProtocolSummary,
    analyze_eavesdropping_sensitivity, analyze_key_rate_vs_distance, compare_protocols,
    compare_protocols_seeded,
};

use crate::core::BellState;
use crate::core::errors::{ConfigError, QkdError};
use crate::eavesdropper::EveAttackConfig;
use crate::physical::ChannelParameters;
use crate::postprocessing::{self, PostProcessingConfig, PostProcessingResult};
use crate::protocols::Protocol;
use crate::protocols::b92::{B92Engine, B92Result};
use crate::protocols::e91::{E91Engine, E91Result};
use crate::protocols::qkd::SiftedKey;
use crate::rng;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

/// Everything one run needs. Built with [`SimulationConfig::builder`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationConfig {
    protocol: Protocol,
    num_signals: usize,
    channel: ChannelParameters,
    eve: Option<EveAttackConfig>,
    post_processing: PostProcessingConfig,
    bell_state: BellState,
    seed: Option<u64>,
}

impl SimulationConfig {
    pub fn builder(protocol: Protocol, num_signals: usize) -> SimulationConfigBuilder {
        SimulationConfigBuilder {
            config: SimulationConfig {
                protocol,
                num_signals,
                channel: ChannelParameters::default(),
                eve: None,
                post_processing: PostProcessingConfig::default(),
                bell_state: BellState::PhiPlus,
                seed: None,
            },
        }
    }

    pub fn to_builder(&self) -> SimulationConfigBuilder {
        SimulationConfigBuilder { config: *self }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn num_signals(&self) -> usize {
        self.num_signals
    }

    pub fn channel(&self) -> &ChannelParameters {
        &self.channel
    }

    pub fn eve(&self) -> Option<&EveAttackConfig> {
        self.eve.as_ref()
    }

    pub fn post_processing(&self) -> &PostProcessingConfig {
        &self.post_processing
    }

    pub fn bell_state(&self) -> BellState {
        self.bell_state
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// True when an eavesdropper can touch at least some signals.
    pub fn attack_configured(&self) -> bool {
        self.eve.is_some_and(|e| e.is_active())
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfigBuilder {
    config: SimulationConfig,
}

impl SimulationConfigBuilder {
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.config.protocol = protocol;
        self
    }

    pub fn num_signals(mut self, num_signals: usize) -> Self {
        self.config.num_signals = num_signals;
        self
    }

    pub fn channel(mut self, channel: ChannelParameters) -> Self {
        self.config.channel = channel;
        self
    }

    pub fn eve(mut self, eve: Option<EveAttackConfig>) -> Self {
        self.config.eve = eve;
        self
    }

    pub fn post_processing(mut self, post_processing: PostProcessingConfig) -> Self {
        self.config.post_processing = post_processing;
        self
    }

    pub fn bell_state(mut self, bell_state: BellState) -> Self {
        self.config.bell_state = bell_state;
        self
    }

    /// Fixes the random seed. Without one, each run draws a fresh seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let c = self.config;
        if c.num_signals == 0 {
            return Err(ConfigError::InvalidCount {
                parameter: "num_signals",
                value: 0,
                expected: "at least one signal",
            });
        }
        if c.protocol == Protocol::E91 && c.bell_state.correlation_sign().is_none() {
            return Err(ConfigError::UnsupportedBellState(c.bell_state.name()));
        }
        Ok(c)
    }
}

/// Raw engine output of a run.
#[derive(Debug, Clone, Serialize)]
pub enum ProtocolRun {
    B92(B92Result),
    E91(E91Result),
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub protocol: Protocol,
    pub num_signals: usize,
    /// Seed of the run's generator.
    pub seed: u64,
    /// ChaCha stream of `seed` the run drew from. Replaying
    /// `rng::stream(seed, stream)` reproduces the run; plain runs use stream 0.
    pub stream: u64,
    pub channel: ChannelParameters,
    pub eve: Option<EveAttackConfig>,
    pub run: ProtocolRun,
    pub sifted_key: SiftedKey,
    /// Absent when the sifted key was empty.
    pub post_processing: Option<PostProcessingResult>,
    pub analysis: SecurityAnalysis,
}

impl SimulationResult {
    pub fn qber(&self) -> f64 {
        self.analysis.qber
    }

    pub fn final_key_length(&self) -> usize {
        self.post_processing
            .as_ref()
            .map_or(0, |p| p.final_key_length)
    }
}

/// Runs one simulation, seeded from the configuration or from the OS.
pub fn run_qkd_simulation(config: &SimulationConfig) -> Result<SimulationResult, QkdError> {
    let seed = config.seed.unwrap_or_else(rng::fresh_seed);
    let mut rng = rng::seeded(seed);
    let mut result = run_qkd_simulation_with_rng(config, &mut rng)?;
    result.seed = seed;
    Ok(result)
}

/// Runs one simulation on a caller-supplied random source. The reported seed
/// is the configured one, or 0, and the reported stream is 0.
pub fn run_qkd_simulation_with_rng<R: Rng + ?Sized>(
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<SimulationResult, QkdError> {
    let (run, sifted_key, measured_eve_information, chsh) = match config.protocol {
        Protocol::B92 => {
            let engine = B92Engine::new(&config.channel, config.eve)?;
            let result = engine.run(config.num_signals, rng)?;
            let sifted = result.sifted_key.clone();
            let info = result.statistics.mean_eve_information;
            (ProtocolRun::B92(result), sifted, info, None)
        }
        Protocol::E91 => {
            let engine = E91Engine::new(&config.channel, config.eve, config.bell_state)?;
            let result = engine.run(config.num_signals, rng)?;
            let sifted = result.sifted_key.clone();
            let info = result.statistics.mean_eve_information;
            let chsh = result.chsh;
            (ProtocolRun::E91(result), sifted, info, Some(chsh))
        }
    };

    let post_processing = (!sifted_key.is_empty()).then(|| {
        postprocessing::post_process(
            &sifted_key.alice,
            &sifted_key.bob,
            &config.post_processing,
            rng,
        )
    });

    let qber = sifted_key.error_rate();
    let key_rate = sifted_key.len() as f64 / config.num_signals as f64;
    let s_value = chsh.map(|c| c.s_value);
    let eve_information =
        analysis::eve_information_bound(config.protocol, qber, s_value, measured_eve_information);
    let verdict = analysis::security_verdict(
        config.protocol,
        sifted_key.len(),
        qber,
        chsh.map(|c| c.bell_violated),
        config.attack_configured(),
    );

    let analysis = SecurityAnalysis {
        qber,
        key_rate,
        eve_information,
        secret_key_rate: analysis::secret_key_rate(key_rate, qber, eve_information),
        verdict,
        chsh_s_value: s_value,
        bell_violated: chsh.map(|c| c.bell_violated),
        bell_significance: chsh.map(|c| c.significance),
    };

    info!(
        protocol = %config.protocol,
        num_signals = config.num_signals,
        sifted = sifted_key.len(),
        qber,
        secret_key_rate = analysis.secret_key_rate,
        verdict = %verdict,
        "simulation finished"
    );
    if verdict == SecurityVerdict::Compromised {
        warn!(protocol = %config.protocol, qber, "run judged compromised");
    }

    Ok(SimulationResult {
        protocol: config.protocol,
        num_signals: config.num_signals,
        seed: config.seed.unwrap_or(0),
        stream: 0,
        channel: config.channel,
        eve: config.eve,
        run,
        sifted_key,
        post_processing,
        analysis,
    })
}
