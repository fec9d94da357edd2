//! Two-integrator-loop filter network of the 6581.
//!
//! The filter proper is a state-variable loop — summer, two integrator
//! stages, resonance feedback — confirmed to be the actual circuit on the
//! die. This module owns the SID's four filter registers and drives the
//! nonlinear integrator stages once per chip cycle:
//!
//! ```text
//!     vi ---[summer]--- vhp ---[int]--- vbp ---[int]--- vlp
//!              ^          resonance ------|
//!              +---------------------- vlp, vi
//! ```
//!
//! Loop state is kept AC-centered: the summing node adds the voice DC
//! operating point before each stage and subtracts the stage's DC output
//! after, so every solver input stays inside the modeled operating region
//! across the whole register grid.

use crate::integrator::Integrator6581;
use crate::model::FilterModel6581;

/// Routes each source into the filter or around it per the FILT nibble.
/// Returns `(filtered_input, bypass_sum)`.
pub fn route_voices(filt: u8, v1: f64, v2: f64, v3: f64, ext: f64) -> (f64, f64) {
    match filt & 0x0f {
        0x0 => (0.0, v1 + v2 + v3 + ext),
        0x1 => (v1, v2 + v3 + ext),
        0x2 => (v2, v1 + v3 + ext),
        0x3 => (v1 + v2, v3 + ext),
        0x4 => (v3, v1 + v2 + ext),
        0x5 => (v1 + v3, v2 + ext),
        0x6 => (v2 + v3, v1 + ext),
        0x7 => (v1 + v2 + v3, ext),
        0x8 => (ext, v1 + v2 + v3),
        0x9 => (v1 + ext, v2 + v3),
        0xa => (v2 + ext, v1 + v3),
        0xb => (v1 + v2 + ext, v3),
        0xc => (v3 + ext, v1 + v2),
        0xd => (v1 + v3 + ext, v2),
        0xe => (v2 + v3 + ext, v1),
        _ => (v1 + v2 + v3 + ext, 0.0),
    }
}

/// Sums the selected filter outputs per the HP/BP/LP mode bits.
pub fn mix_modes(vhp: f64, vbp: f64, vlp: f64, hp_bp_lp: u8) -> f64 {
    let mut v = 0.0;
    if hp_bp_lp & 0x1 != 0 {
        v += vlp;
    }
    if hp_bp_lp & 0x2 != 0 {
        v += vbp;
    }
    if hp_bp_lp & 0x4 != 0 {
        v += vhp;
    }
    v
}

/// The 6581 filter: registers, routing, and the two-integrator loop.
///
/// Borrows the calibration model; voices enter `clock` as AC voltages in
/// normalized units, centered on the voice DC level.
pub struct Filter6581<'a> {
    model: &'a FilterModel6581,

    /// Highpass-input stage: consumes vhp, produces vbp.
    hp_stage: Integrator6581<'a>,
    /// Bandpass-input stage: consumes vbp, produces vlp.
    bp_stage: Integrator6581<'a>,

    vhp: f64,
    vbp: f64,
    vlp: f64,
    /// Sum of the sources routed around the filter.
    vnf: f64,

    enabled: bool,

    /// 11-bit cutoff register.
    fc: u16,
    /// Resonance nibble.
    res: u8,
    /// Routing nibble.
    filt: u8,
    voice3_off: bool,
    /// HP/BP/LP mode bits.
    hp_bp_lp: u8,
    /// Master volume nibble.
    vol: u8,
}

impl<'a> Filter6581<'a> {
    pub fn new(model: &'a FilterModel6581) -> Self {
        let mut filter = Filter6581 {
            model,
            hp_stage: model.build_integrator(),
            bp_stage: model.build_integrator(),
            vhp: 0.0,
            vbp: 0.0,
            vlp: 0.0,
            vnf: 0.0,
            enabled: true,
            fc: 0,
            res: 0,
            filt: 0,
            voice3_off: false,
            hp_bp_lp: 0,
            vol: 0,
        };
        filter.update_cutoff();
        filter
    }

    /// Pushes the cutoff DAC output to both stages. Runs on every register
    /// write that can change `fc`, before the next cycle is clocked.
    fn update_cutoff(&mut self) {
        let vw = self.model.f0_dac(self.fc as usize);
        self.hp_stage.set_vw(vw);
        self.bp_stage.set_vw(vw);
    }

    /// Biases an AC loop signal at the voice DC operating point, limited to
    /// the summing op-amp's output rails.
    fn bias(&self, v: f64) -> f64 {
        (self.model.voice_dc() + v).clamp(0.0, self.model.opamp_vmax())
    }

    fn solve_stages(&mut self, vi: f64) {
        let dc = self.model.stage_dc();
        let hp_in = self.bias(self.vhp);
        self.vbp = self.hp_stage.solve(hp_in) - dc;
        let bp_in = self.bias(self.vbp);
        self.vlp = self.bp_stage.solve(bp_in) - dc;

        // Resonance from the die's 4-bit ladder: 1/Q = ~res / 8.
        let inv_q = (!self.res & 0x0f) as f64 / 8.0;
        self.vhp = self.vbp * inv_q - self.vlp - vi;
    }

    /// Advances the filter by one chip cycle.
    pub fn clock(&mut self, v1: f64, v2: f64, v3: f64, ext: f64) {
        let v3 = if self.voice3_off && self.filt & 0x04 == 0 {
            0.0
        } else {
            v3
        };

        if !self.enabled {
            self.vnf = v1 + v2 + v3 + ext;
            self.vhp = 0.0;
            self.vbp = 0.0;
            self.vlp = 0.0;
            return;
        }

        let (vi, vnf) = route_voices(self.filt, v1, v2, v3, ext);
        self.vnf = vnf;
        self.solve_stages(vi);
    }

    /// Mixed output of the current cycle, scaled by the volume nibble.
    pub fn output(&self) -> f64 {
        let vf = if self.enabled {
            mix_modes(self.vhp, self.vbp, self.vlp, self.hp_bp_lp)
        } else {
            0.0
        };
        (self.vnf + vf) * (self.vol as f64 / 15.0)
    }

    /// Full reset: registers to zero, fresh integrator stages (stage state
    /// has no partial reset — reconstruction is the reset).
    pub fn reset(&mut self) {
        self.fc = 0;
        self.res = 0;
        self.filt = 0;
        self.voice3_off = false;
        self.hp_bp_lp = 0;
        self.vol = 0;
        self.vhp = 0.0;
        self.vbp = 0.0;
        self.vlp = 0.0;
        self.vnf = 0.0;
        self.hp_stage = self.model.build_integrator();
        self.bp_stage = self.model.build_integrator();
        self.update_cutoff();
    }

    /// Bypasses the filter network entirely when disabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_fc_lo(&mut self, value: u8) {
        self.fc = (self.fc & 0x7f8) | (value as u16 & 0x007);
        self.update_cutoff();
    }

    pub fn set_fc_hi(&mut self, value: u8) {
        self.fc = ((value as u16) << 3) & 0x7f8 | (self.fc & 0x007);
        self.update_cutoff();
    }

    pub fn set_res_filt(&mut self, value: u8) {
        self.res = (value >> 4) & 0x0f;
        self.filt = value & 0x0f;
    }

    pub fn set_mode_vol(&mut self, value: u8) {
        self.voice3_off = value & 0x80 != 0;
        self.hp_bp_lp = (value >> 4) & 0x07;
        self.vol = value & 0x0f;
    }

    pub fn fc_lo(&self) -> u8 {
        (self.fc & 0x007) as u8
    }

    pub fn fc_hi(&self) -> u8 {
        (self.fc >> 3) as u8
    }

    pub fn res_filt(&self) -> u8 {
        (self.res << 4) | (self.filt & 0x0f)
    }

    pub fn mode_vol(&self) -> u8 {
        let v3 = if self.voice3_off { 0x80 } else { 0 };
        v3 | (self.hp_bp_lp << 4) | (self.vol & 0x0f)
    }
}
