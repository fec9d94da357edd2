//! C64 output stage — the RC networks between the chip and the audio jack.
//!
//! Two first-order sections, clocked at chip rate:
//!
//! - low-pass, R = 10 kΩ, C = 1000 pF: -3 dB at ~16 kHz
//! - high-pass, R = 1 kΩ, C = 10 µF: -3 dB at ~16 Hz (the DC blocker,
//!   assuming a 1 kΩ audio equipment input impedance)
//!
//! The board connects the two with a BJT voltage follower whose own effect
//! needs MHz-level modeling; the simple cascade is what remains at audio
//! rates. The high-pass also strips the DC operating-point offsets the
//! filter network's outputs carry.

use crate::clock;

/// Low-pass RC time constant (s): 10 kΩ * 1000 pF.
const RC_LP: f64 = 10e3 * 1000e-12;
/// High-pass RC time constant (s): 1 kΩ * 10 µF.
const RC_HP: f64 = 1e3 * 10e-6;

/// Output stage filter state. One instance per chip output.
pub struct ExternalFilter {
    vlp: f64,
    vhp: f64,
    alpha_lp: f64,
    alpha_hp: f64,
}

impl ExternalFilter {
    /// Output stage clocked at the PAL rate; call `set_clock_frequency` for
    /// other machines.
    pub fn new() -> Self {
        let mut filter = ExternalFilter {
            vlp: 0.0,
            vhp: 0.0,
            alpha_lp: 0.0,
            alpha_hp: 0.0,
        };
        filter.set_clock_frequency(clock::PAL);
        filter
    }

    /// Recomputes the per-cycle coefficients: alpha = dt / (dt + RC).
    pub fn set_clock_frequency(&mut self, frequency: f64) {
        let dt = 1.0 / frequency;
        self.alpha_lp = dt / (dt + RC_LP);
        self.alpha_hp = dt / (dt + RC_HP);
    }

    /// Advances both sections by one chip cycle.
    #[inline]
    pub fn clock(&mut self, vi: f64) {
        self.vlp += self.alpha_lp * (vi - self.vlp);
        self.vhp += self.alpha_hp * (self.vlp - self.vhp);
    }

    /// Audio output for the current cycle.
    #[inline]
    pub fn output(&self) -> f64 {
        self.vlp - self.vhp
    }

    pub fn reset(&mut self) {
        self.vlp = 0.0;
        self.vhp = 0.0;
    }
}

impl Default for ExternalFilter {
    fn default() -> Self {
        Self::new()
    }
}
