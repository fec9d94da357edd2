//! OpenSID DSP library — MOS 6581 SID filter circuit simulation.
//!
//! Pure DSP math with no audio framework dependencies. The 6581 filter is a
//! two-integrator-loop biquad whose integrators are continuous-time feedback
//! circuits built from transistors operating across subthreshold, triode, and
//! saturation regions. This crate collapses the transistor physics into
//! lookup tables at calibration time (`model`), then runs a one-step fixpoint
//! relaxation per chip cycle (`integrator`) inside the register-controlled
//! filter network (`filter`), followed by the C64 board's RC output stage
//! (`external_filter`).

pub mod dac;
pub mod external_filter;
pub mod filter;
pub mod integrator;
pub mod lut;
pub mod model;
pub mod spline;

/// Chip clock frequencies for common host machines.
pub mod clock {
    /// PAL C64 clock (~985 kHz).
    pub const PAL: f64 = 985_248.0;
    /// NTSC C64 clock (~1.02 MHz).
    pub const NTSC: f64 = 1_022_727.0;
}
