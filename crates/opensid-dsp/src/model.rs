//! 6581 filter model calibration.
//!
//! Derives the integrator's transfer tables and scalar constants from the
//! chip's physical parameters and a measured op-amp curve. Everything here
//! runs once per model instance; the per-cycle hot path only reads the
//! resulting immutable tables. Retuning means building a new model.
//!
//! Voltage scale: all voltages handed to the integrator are normalized as
//! `n16 * (v - vmin)`, mapping the usable analog range `[vmin, Vddt]` onto
//! `[0, 65535]`. `vmin` is the lowest measured op-amp output. The scale keeps
//! the solver's literal constants (the 2^16 snake correction and the 32768
//! op-amp re-bias) dimensionally consistent with the table domains.
//!
//! Memory footprint: ~1.5 MB of f64 tables per model.

use crate::dac::kinked_dac_table;
use crate::integrator::Integrator6581;
use crate::lut::{InterpolatedLut, Lut};
use crate::spline::{MonotoneSpline, Point};

/// Bits in the cutoff frequency DAC.
const DAC_BITS: usize = 11;

/// Segments per nonlinear transfer table.
const LUT_SEGMENTS: usize = 1 << 16;

/// Boltzmann constant (J/K).
const K_BOLTZMANN: f64 = 1.380649e-23;
/// Electron charge (C).
const Q_ELECTRON: f64 = 1.602176634e-19;
/// Die temperature (°C).
const TEMPERATURE: f64 = 27.0;
/// Thermal voltage Ut = kT/q, ~26 mV at die temperature.
const UT: f64 = K_BOLTZMANN * (TEMPERATURE + 273.15) / Q_ELECTRON;

/// Power supplies run slightly out of spec.
const VOLTAGE_SKEW: f64 = 1.015;
/// Supply voltage (V).
const VDD: f64 = 12.0 * VOLTAGE_SKEW;
/// Transistor threshold voltage (V).
const VTH: f64 = 1.31;
/// Transconductance coefficient u*Cox (A/V²).
const UCOX: f64 = 20e-6;
/// EKV gate coupling coefficient.
const K: f64 = 1.0;
/// W/L of the VCR transistor.
const WL_VCR: f64 = 9.0;
/// W/L of the snake transistor.
const WL_SNAKE: f64 = 1.0 / 115.0;
/// Integration capacitor (F).
const CAP: f64 = 470e-12;
/// Reference cycle length for the per-cycle current scale; the chip clock
/// sits within 4% of 1 MHz on both PAL and NTSC machines.
const DT: f64 = 1.0e-6;

/// Cutoff DAC zero offset (V) before the curve trim.
const DAC_ZERO: f64 = 6.65;
/// Cutoff DAC output span (V).
const DAC_SCALE: f64 = 2.63;

/// Nominal DC level of a voice output (V).
const VOICE_DC: f64 = 5.0;
/// Peak-to-peak voltage range of one voice (V).
const VOICE_RANGE: f64 = 1.5;

/// Op-amp voltage transfer function, measured on CAP1B/CAP1A of a chip
/// marked MOS 6581R4AR 0687 14. Input and output voltages of all measured
/// chips stay within 0.81 V - 10.31 V.
const OPAMP_VOLTAGE: [(f64, f64); 33] = [
    (0.81, 10.31), // Approximate start of actual range
    (2.40, 10.31),
    (2.60, 10.30),
    (2.70, 10.29),
    (2.80, 10.26),
    (2.90, 10.17),
    (3.00, 10.04),
    (3.10, 9.83),
    (3.20, 9.58),
    (3.30, 9.32),
    (3.50, 8.69),
    (3.70, 8.00),
    (4.00, 6.89),
    (4.40, 5.21),
    (4.54, 4.54), // Working point (vi = vo)
    (4.60, 4.19),
    (4.80, 3.00),
    (4.90, 2.30), // Change of curvature
    (4.95, 2.03),
    (5.00, 1.88),
    (5.05, 1.77),
    (5.10, 1.69),
    (5.20, 1.58),
    (5.40, 1.44),
    (5.60, 1.33),
    (5.80, 1.26),
    (6.00, 1.21),
    (6.40, 1.12),
    (7.00, 1.02),
    (7.50, 0.97),
    (8.50, 0.89),
    (10.00, 0.81),
    (10.31, 0.81), // Approximate end of actual range
];

/// Calibration for one 6581 chip instance: the three integrator transfer
/// tables, the cutoff DAC table, and the derived scalar constants.
///
/// Tables are immutable once built and shared read-only by every integrator
/// and filter constructed from this model.
pub struct FilterModel6581 {
    vcr_kvg: InterpolatedLut,
    vcr_n_ids_term: InterpolatedLut,
    opamp_rev: InterpolatedLut,
    f0_dac: Vec<f64>,

    n16: f64,
    vmin: f64,
    kvddt: f64,
    n_snake: f64,

    /// Highest normalized voltage the op-amp can output.
    opamp_vmax: f64,
    /// Normalized voice DC level.
    voice_dc: f64,
    /// Stage output at the DC operating point (vx = voice DC).
    stage_dc: f64,
}

impl FilterModel6581 {
    /// Calibration with the nominal filter curve.
    pub fn new() -> Self {
        Self::with_curve(0.5)
    }

    /// Calibration with a curve trim in `[0, 1]` (dark to bright), shifting
    /// the cutoff DAC zero the way individual chips differ in practice.
    pub fn with_curve(curve: f64) -> Self {
        let curve = curve.clamp(0.0, 1.0);

        let vddt = VDD - VTH;
        let vmin = OPAMP_VOLTAGE[0].0;
        let vmax = vddt.max(OPAMP_VOLTAGE[0].1);
        let n16 = 65535.0 / (vmax - vmin);

        let opamp_vmax = n16 * (OPAMP_VOLTAGE[0].1 - vmin);
        let opamp_rev = build_opamp_rev(n16, vmin, opamp_vmax);
        let vcr_kvg = build_vcr_kvg(n16 * (vddt - vmin));
        let vcr_n_ids_term = build_vcr_n_ids_term(n16);
        let f0_dac = build_f0_dac(n16, vmin, DAC_ZERO + (1.0 - curve));

        let kvddt = n16 * (vddt - vmin);
        // Snake per-cycle current scale; the (vmax - vmin) factor carries a
        // 2^16 surplus relative to the n16 voltage scale, divided back out
        // in the solver's charge update.
        let n_snake = (vmax - vmin) * (UCOX / (2.0 * K) * WL_SNAKE * DT / CAP);

        let voice_dc = n16 * (VOICE_DC - vmin);
        // The stage's DC operating point: at equilibrium both transistor
        // currents vanish, which pins vx to the input DC level; inverting
        // the op-amp table there gives the resting capacitor charge.
        let vc_dc = 2.0 * (invert_lut(&opamp_rev, voice_dc) - 32768.0);
        let stage_dc = voice_dc - vc_dc;

        FilterModel6581 {
            vcr_kvg,
            vcr_n_ids_term,
            opamp_rev,
            f0_dac,
            n16,
            vmin,
            kvddt,
            n_snake,
            opamp_vmax,
            voice_dc,
            stage_dc,
        }
    }

    /// Builds an integrator stage borrowing this model's tables. The model
    /// must outlive every stage built from it.
    pub fn build_integrator(&self) -> Integrator6581<'_> {
        Integrator6581::new(
            &self.vcr_kvg,
            &self.vcr_n_ids_term,
            &self.opamp_rev,
            self.kvddt,
            self.n_snake,
        )
    }

    /// Control voltage Vw for an 11-bit cutoff register code.
    pub fn f0_dac(&self, fc: usize) -> f64 {
        self.f0_dac[fc]
    }

    /// Maps a voltage in volts to the normalized scale.
    pub fn norm_voltage(&self, volts: f64) -> f64 {
        self.n16 * (volts - self.vmin)
    }

    /// Normalized voice DC level (the summing-node bias).
    pub fn voice_dc(&self) -> f64 {
        self.voice_dc
    }

    /// Normalized units per full-scale voice swing.
    pub fn voice_scale(&self) -> f64 {
        self.n16 * VOICE_RANGE
    }

    /// Upper rail of the op-amp output, normalized.
    pub fn opamp_vmax(&self) -> f64 {
        self.opamp_vmax
    }

    /// Stage output voltage at the DC operating point.
    pub fn stage_dc(&self) -> f64 {
        self.stage_dc
    }
}

impl Default for FilterModel6581 {
    fn default() -> Self {
        Self::new()
    }
}

/// Reverse op-amp transfer: capacitor charge index to op-amp input voltage.
///
/// The measured curve maps op-amp input to output; the solver needs the
/// reverse direction as a function of the charge `vc = vx - vo`, so the
/// measured points are re-parameterized to `x = n16*(vi - vo)/2 + 32768`
/// (the solver's midpoint-centered charge index) against `y = n16*(vi -
/// vmin)`, then resampled through a monotone spline. Entries clamp to the
/// op-amp's real output range so `vx` can never reach the modeled region's
/// upper bound.
fn build_opamp_rev(n16: f64, vmin: f64, opamp_vmax: f64) -> InterpolatedLut {
    let points: Vec<Point> = OPAMP_VOLTAGE
        .iter()
        .map(|&(vi, vo)| Point {
            x: n16 * (vi - vo) / 2.0 + 32768.0,
            y: n16 * (vi - vmin),
        })
        .collect();
    let spline = MonotoneSpline::new(&points);

    InterpolatedLut::from_fn(0.0, 65536.0, LUT_SEGMENTS, |x| {
        spline.evaluate(x).clamp(0.0, opamp_vmax)
    })
}

/// VCR gate voltage: `Vg = Vddt - sqrt(i * 2^16)` over the mean-square
/// index the solver computes. Replaces the analytic square-root solve of
/// the implicit triode-mode gate equation.
fn build_vcr_kvg(n_vddt: f64) -> InterpolatedLut {
    InterpolatedLut::from_fn(0.0, 65536.0, LUT_SEGMENTS, |i| {
        (n_vddt - (i * 65536.0).sqrt()).max(0.0)
    })
}

/// One EKV conduction term as a function of clamped overdrive voltage:
///
/// ```text
///     Ids = Is * (if - ir)
///     Is  = (2 * uCox * Ut² / k) * W/L
///     if  = ln²(1 + e^((k*(Vg - Vt) - Vs) / (2*Ut)))
///     ir  = ln²(1 + e^((k*(Vg - Vt) - Vd) / (2*Ut)))
/// ```
///
/// The table stores one term scaled to normalized charge units per cycle;
/// the solver subtracts two lookups for the signed bidirectional current.
fn build_vcr_n_ids_term(n16: f64) -> InterpolatedLut {
    // Moderate inversion characteristic current.
    let is = (2.0 * UCOX * UT * UT / K) * WL_VCR;
    // Charge units per cycle: dVc = I * dt / C, normalized by n16.
    let n_is = n16 * DT / CAP * is;

    InterpolatedLut::from_fn(0.0, 65536.0, LUT_SEGMENTS, |i| {
        let overdrive = i / n16 - K * VTH;
        let log_term = (overdrive / (2.0 * UT)).exp().ln_1p();
        n_is * log_term * log_term
    })
}

/// Cutoff DAC output voltages through the kinked ladder model.
fn build_f0_dac(n16: f64, vmin: f64, dac_zero: f64) -> Vec<f64> {
    kinked_dac_table(DAC_BITS)
        .into_iter()
        .map(|fcd| n16 * (dac_zero + fcd * DAC_SCALE - vmin))
        .collect()
}

/// Inverts a monotone increasing table by bisection on its input domain.
fn invert_lut(lut: &InterpolatedLut, target: f64) -> f64 {
    let (mut lo, mut hi) = (0.0f64, 65536.0f64);
    for _ in 0..64 {
        let mid = (lo + hi) / 2.0;
        if lut.output(mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}
