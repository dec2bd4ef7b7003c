use crate::simulation::analysis::{COMPROMISED_QBER, SECURE_QBER};
use crate::simulation::{ProtocolRun, SecurityVerdict, SimulationResult};
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;

/// Plain-text report of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub summary: String,
    pub security_analysis: String,
    pub performance_metrics: String,
    pub recommendations: Vec<String>,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Summary ==")?;
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;
        writeln!(f, "== Security analysis ==")?;
        writeln!(f, "{}", self.security_analysis)?;
        writeln!(f)?;
        writeln!(f, "== Performance ==")?;
        writeln!(f, "{}", self.performance_metrics)?;
        writeln!(f)?;
        writeln!(f, "== Recommendations ==")?;
        for r in &self.recommendations {
            writeln!(f, "- {r}")?;
        }
        Ok(())
    }
}

pub fn generate_simulation_report(result: &SimulationResult) -> SimulationReport {
    let a = &result.analysis;
    let channel = &result.channel;

    let attack = match &result.eve {
        Some(eve) if eve.is_active() => format!(
            "{} attack on {:.0}% of signals",
            eve.kind(),
            eve.interception_probability() * 100.0
        ),
        _ => "no eavesdropper".to_string(),
    };
    let summary = format!(
        "{} run with {} signals over {:.1} km of fiber ({}). \
         Sifted key: {} bits, QBER {:.2}%, verdict: {}.",
        result.protocol,
        result.num_signals,
        channel.fiber_length_km(),
        attack,
        result.sifted_key.len(),
        a.qber * 100.0,
        a.verdict
    );

    let mut security_analysis = format!(
        "Eve's information bound: {:.4} bits per sifted bit.",
        a.eve_information
    );
    if let (Some(s), Some(violated)) = (a.chsh_s_value, a.bell_violated) {
        let _ = write!(
            security_analysis,
            " CHSH S = {:.3} ({}classical bound 2, {:.1} sigma).",
            s,
            if violated { "violates the " } else { "within the " },
            a.bell_significance.unwrap_or(0.0)
        );
    }
    if let Some(pp) = &result.post_processing {
        let _ = write!(
            security_analysis,
            " Reconciliation revealed {} bits; \
             finite-size bound allows {} secure bits (eps = {:e}).",
            pp.bits_revealed,
            pp.finite_size.secure_key_length,
            pp.finite_size.epsilon
        );
    }

    let mut performance_metrics = format!(
        "Key rate {:.4} sifted bits/signal, secret key rate {:.5} bits/signal.",
        a.key_rate, a.secret_key_rate
    );
    match &result.run {
        ProtocolRun::B92(r) => {
            let s = &r.statistics;
            let _ = write!(
                performance_metrics,
                " Detected {}, lost {}, inconclusive {}, dark counts {}; \
                 conclusive rate {:.3}, USD efficiency {:.3}.",
                s.detected,
                s.lost,
                s.inconclusive,
                s.dark_counts,
                s.conclusive_rate,
                s.usd_efficiency
            );
        }
        ProtocolRun::E91(r) => {
            let s = &r.statistics;
            let _ = write!(
                performance_metrics,
                " Measured {} pairs ({} key, {} test), lost {}; expected S {:.3}.",
                s.measured, s.key_pairs, s.test_pairs, s.lost, s.expected_s_value
            );
        }
    }
    if let Some(pp) = &result.post_processing {
        let _ = write!(
            performance_metrics,
            " Final key: {} bits (amplification factor {:.3}).",
            pp.final_key_length, pp.amplification_factor
        );
    }

    SimulationReport {
        summary,
        security_analysis,
        performance_metrics,
        recommendations: recommendations(result),
    }
}

fn recommendations(result: &SimulationResult) -> Vec<String> {
    let a = &result.analysis;
    let mut out = Vec::new();

    if result.sifted_key.is_empty() {
        out.push("No signals survived; shorten the link or raise detector efficiency.".to_string());
        return out;
    }
    match a.verdict {
        SecurityVerdict::Secure => out.push("The key can be used.".to_string()),
        SecurityVerdict::Compromised => out.push(format!(
            "Discard the key: QBER {:.2}% exceeds {:.0}% or the Bell test failed under attack.",
            a.qber * 100.0,
            COMPROMISED_QBER * 100.0
        )),
        SecurityVerdict::Unknown => out.push(format!(
            "QBER {:.2}% is between {:.0}% and {:.0}%; \
             repeat with more signals before trusting the key.",
            a.qber * 100.0,
            SECURE_QBER * 100.0,
            COMPROMISED_QBER * 100.0
        )),
    }
    if a.bell_violated == Some(false) {
        out.push("The CHSH inequality was not violated; check the entangled source.".to_string());
    }
    if result.final_key_length() == 0 {
        out.push("Privacy amplification left no key; collect more signals.".to_string());
    }
    if result.channel.fiber_length_km() > 100.0 {
        out.push("Losses dominate beyond 100 km; consider a trusted relay.".to_string());
    }
    out
}
