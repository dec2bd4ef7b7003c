//! Quantum Key Distribution protocols.
//!
//! This module contains the per-signal protocol engines and the shared
//! outcome types they report.

pub mod qkd;

pub use qkd::{b92, e91};

use serde::Serialize;
use std::f64::consts::FRAC_PI_2;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    /// Two non-orthogonal states with unambiguous state discrimination.
    B92,
    /// Entangled pairs with a CHSH test.
    E91,
}

impl Protocol {
    /// Measurement angles an intercept-resend attacker picks from.
    pub fn eavesdropper_bases(self) -> &'static [f64] {
        match self {
            Protocol::B92 => &[0.0, FRAC_PI_2],
            Protocol::E91 => &e91::BOB_ANGLES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Protocol::B92 => "B92",
            Protocol::E91 => "E91",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
