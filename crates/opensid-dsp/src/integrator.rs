//! Nonlinear integrator solver for the 6581 filter.
//!
//! Each filter stage of the 6581 is an inverting op-amp integrator:
//!
//! ```text
//!                    +---C---+
//!                    |       |
//!      vi --o--Rw--o-o--[A>--o-- vo
//!           |      | vx
//!           +--Rs--+
//! ```
//!
//! Rw is a voltage-controlled resistor (VCR) transistor whose gate voltage
//! sets the cutoff frequency, Rs is a fixed-bias "snake" transistor kept in
//! triode mode for DC stability, C is the integration capacitor and A the
//! inverting op-amp with its measured transfer function.
//!
//! Kirchhoff at the summing node gives the charge recurrence
//!
//! ```text
//!     vc = vc0 - n * (I_Rw(vi, g(vc)) + I_Rs(vi, g(vc)))
//! ```
//!
//! a self-referential equation through the op-amp transfer g. Instead of
//! iterating it to numeric convergence every cycle, `solve` takes a single
//! substitution step seeded with the previous cycle's op-amp output: the
//! circuit's time constant is continuous and the signal moves little between
//! adjacent chip cycles, so one step per cycle tracks the true solution.
//!
//! The transistor currents come from tables rather than analytic solves:
//!
//! - The snake obeys the quadratic law `Ids = K/2 * W/L * (Vgst² - Vgdt²)`,
//!   valid across triode and saturation, symmetric in its terminals — no
//!   sign branch for the current direction.
//! - The VCR gate voltage `Vg = Vddt - sqrt(((Vddt - Vw)² + Vgdt²) / 2)`
//!   is one table lookup on the mean-square index.
//! - The VCR current uses the EKV model, `Ids = Is * (if - ir)`, where both
//!   terms come from one monotone table and their signed difference carries
//!   current in either direction.
//!
//! All voltages are in the model's normalized 16-bit scale; see the scale
//! notes on `FilterModel6581`.

use crate::lut::Lut;

/// Integrator stage of the 6581 filter.
///
/// Borrows its three transfer tables from the owning model; the tables are
/// shared read-only across every stage built from the same calibration.
pub struct Integrator6581<'a> {
    vcr_kvg: &'a dyn Lut,
    vcr_n_ids_term: &'a dyn Lut,
    opamp_rev: &'a dyn Lut,

    /// Cached (kVddt - Vw)², refreshed only when the control voltage moves.
    vddt_vw_2: f64,

    /// Op-amp output voltage estimate. Seeds the next relaxation step.
    vx: f64,

    /// Accumulated capacitor charge.
    vc: f64,

    /// Normalized Vdd - Vth; upper bound of the valid operating region.
    kvddt: f64,

    /// Snake per-cycle current scale. Carries a 2^16 factor that `solve`
    /// divides back out.
    n_snake: f64,
}

impl<'a> Integrator6581<'a> {
    /// A fresh stage starts with zero charge and a zero output estimate.
    /// There is no reset: reconstruction is the reset.
    pub fn new(
        vcr_kvg: &'a dyn Lut,
        vcr_n_ids_term: &'a dyn Lut,
        opamp_rev: &'a dyn Lut,
        kvddt: f64,
        n_snake: f64,
    ) -> Self {
        Integrator6581 {
            vcr_kvg,
            vcr_n_ids_term,
            opamp_rev,
            vddt_vw_2: 0.0,
            vx: 0.0,
            vc: 0.0,
            kvddt,
            n_snake,
        }
    }

    /// Sets the VCR control voltage (the cutoff DAC output).
    ///
    /// Caches (kVddt - Vw)², the control half of the VCR gate equation,
    /// which would otherwise be recomputed every cycle for a value that only
    /// moves on a register write. Takes effect from the next `solve`.
    pub fn set_vw(&mut self, vw: f64) {
        self.vddt_vw_2 = (self.kvddt - vw) * (self.kvddt - vw);
    }

    /// Advances the stage by one chip cycle and returns the output voltage.
    ///
    /// `vi` must stay strictly below `kVddt` — above it the input transistor
    /// would leave its modeled region, which indicates a calibration or
    /// upstream-network defect, not a runtime condition.
    #[inline]
    pub fn solve(&mut self, vi: f64) -> f64 {
        // Vgst > 0 keeps the snake out of subthreshold; both checks hold by
        // construction in a correctly configured network.
        debug_assert!(self.vx < self.kvddt);
        debug_assert!(vi < self.kvddt);

        // Overdrive voltages at the two terminals.
        let vgst = self.kvddt - self.vx;
        let vgdt = self.kvddt - vi;

        let vgst_2 = vgst * vgst;
        let vgdt_2 = vgdt * vgdt;

        // Snake current from the symmetric quadratic law.
        let n_i_snake = self.n_snake * (vgst_2 - vgdt_2);

        // VCR gate voltage: Vg = Vddt - sqrt(((Vddt - Vw)² + Vgdt²) / 2),
        // one lookup on the mean-square index.
        let kvg = self
            .vcr_kvg
            .output(((self.vddt_vw_2 + vgdt_2) / 2.0) / 65536.0);

        // Terminal overdrives, clamped at the cutoff boundary where the
        // VCR stops conducting.
        let vgs = (kvg - self.vx).max(0.0);
        let vgd = (kvg - vi).max(0.0);

        // VCR current: signed difference of the two EKV terms.
        let n_i_vcr = self.vcr_n_ids_term.output(vgs) - self.vcr_n_ids_term.output(vgd);

        // Capacitor charge update. The snake scale carries an extra 2^16.
        self.vc += n_i_snake / 65536.0 + n_i_vcr;

        // vx = g(vc): the charge through the op-amp's reverse transfer,
        // re-biased to the table's midpoint-centered domain.
        self.vx = self.opamp_rev.output(self.vc / 2.0 + 32768.0);

        self.vx - self.vc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::InterpolatedLut;
    use crate::model::FilterModel6581;

    /// output(x) = x. Exact under linear interpolation, but kept explicit
    /// so the tests read as transfer-function choices.
    struct IdentityLut;

    impl Lut for IdentityLut {
        fn output(&self, x: f64) -> f64 {
            x
        }
    }

    /// output(x) = constant, a pinned VCR gate voltage.
    struct ConstantLut(f64);

    impl Lut for ConstantLut {
        fn output(&self, _x: f64) -> f64 {
            self.0
        }
    }

    /// output(x) = x - 32768, an op-amp table with its working point moved
    /// to zero so mirrored charge gives mirrored output.
    struct CenteredLut;

    impl Lut for CenteredLut {
        fn output(&self, x: f64) -> f64 {
            x - 32768.0
        }
    }

    #[test]
    fn golden_step_with_identity_tables() {
        let lut = IdentityLut;
        let mut stage = Integrator6581::new(&lut, &lut, &lut, 1.0, 1.0);

        stage.set_vw(0.5);
        let vo = stage.solve(0.2);

        // The same step by hand:
        //   Vgst = 1 - 0 = 1, Vgdt = 1 - 0.2 = 0.8
        //   n_I_snake = 1 * (1 - 0.64) = 0.36
        //   kVg = ((0.25 + 0.64) / 2) / 65536
        //   Vgs = kVg - 0, Vgd = 0 (0.2 > kVg)
        //   n_I_vcr = kVg - 0
        //   vc = 0.36 / 65536 + kVg
        //   vx = vc / 2 + 32768
        //   vo = vx - vc
        let vgdt = 1.0 - 0.2;
        let kvg = (0.25 + vgdt * vgdt) / 2.0 / 65536.0;
        let vc = 0.36 / 65536.0 + kvg;
        let expected = (vc / 2.0 + 32768.0) - vc;

        assert!(
            (vo - expected).abs() < 1e-12,
            "expected {expected}, got {vo}"
        );
    }

    #[test]
    fn identity_table_lut_matches_identity_function() {
        // The golden step again, through a real two-sample identity table
        // instead of the function — interpolation must not change it. One
        // step per fresh stage: the toy kVddt only admits the first step.
        let table = InterpolatedLut::new(0.0, 65536.0, vec![0.0, 65536.0]);
        let f = IdentityLut;

        for vi in [0.2, 0.1, 0.3, 0.25] {
            let mut stage = Integrator6581::new(&table, &table, &table, 1.0, 1.0);
            let mut reference = Integrator6581::new(&f, &f, &f, 1.0, 1.0);
            stage.set_vw(0.5);
            reference.set_vw(0.5);

            let a = stage.solve(vi);
            let b = reference.solve(vi);
            assert!((a - b).abs() < 1e-9, "diverged at vi={vi}: {a} vs {b}");
        }
    }

    #[test]
    fn replays_deterministically() {
        let model = FilterModel6581::new();
        let vw = model.f0_dac(1024);

        let run = |_: u32| {
            let mut stage = model.build_integrator();
            stage.set_vw(vw);
            (0..2000)
                .map(|i| stage.solve(model.voice_dc() + (i % 700) as f64))
                .collect::<Vec<f64>>()
        };

        let first = run(0);
        let second = run(1);
        assert_eq!(first, second, "identical input must replay bit-identical");
    }

    #[test]
    fn set_vw_touches_only_the_cached_term() {
        let model = FilterModel6581::new();
        let mut stage = model.build_integrator();
        stage.set_vw(model.f0_dac(512));

        for _ in 0..100 {
            stage.solve(model.voice_dc());
        }

        let (vx, vc) = (stage.vx, stage.vc);
        stage.set_vw(model.f0_dac(2047));

        assert_eq!(stage.vx, vx, "set_vw must not move vx");
        assert_eq!(stage.vc, vc, "set_vw must not move vc");
        let diff = stage.kvddt - model.f0_dac(2047);
        assert_eq!(stage.vddt_vw_2, diff * diff, "cached control term");
    }

    #[test]
    fn settles_on_constant_input() {
        let model = FilterModel6581::new();
        let mut stage = model.build_integrator();
        stage.set_vw(model.f0_dac(1024));

        // Arbitrary starting state: run hot input first, then hold still.
        for _ in 0..500 {
            stage.solve(model.voice_dc() + 4000.0);
        }

        let hold = model.voice_dc();
        let mut last = 0.0;
        for _ in 0..200_000 {
            last = stage.solve(hold);
        }

        // Near the fixed point consecutive outputs stop moving ...
        let next = stage.solve(hold);
        assert!(
            (next - last).abs() < 1e-3,
            "still moving after settle: {last} -> {next}"
        );
        // ... and the fixed point is the one the calibration predicts.
        assert!(
            (next - model.stage_dc()).abs() < 1.0,
            "settled at {next}, expected {}",
            model.stage_dc()
        );
    }

    #[test]
    fn swapped_terminals_mirror_the_output() {
        // Pin the gate voltage, disable the snake, and center the op-amp
        // table: the remaining current is the signed difference of the two
        // EKV terms, so exchanging which terminal holds the larger voltage
        // must mirror the whole output sequence around zero.
        let kvg = ConstantLut(1000.0);
        let ids = IdentityLut;
        let rev = CenteredLut;

        let mut pos = Integrator6581::new(&kvg, &ids, &rev, 1e9, 0.0);
        let mut neg = Integrator6581::new(&kvg, &ids, &rev, 1e9, 0.0);
        pos.set_vw(0.0);
        neg.set_vw(0.0);

        let inputs = [120.0, -340.0, 80.0, 455.0, -10.0, 230.0];
        for &vi in &inputs {
            let a = pos.solve(vi);
            let b = neg.solve(-vi);
            assert!(
                (a + b).abs() < 1e-9,
                "outputs should mirror: {a} vs {b} for vi={vi}"
            );
        }
    }

    #[test]
    fn operating_region_holds_across_the_register_grid() {
        // Sweep cutoff codes and a wide input range; the relaxation must
        // keep vx strictly inside the modeled region at every step.
        let model = FilterModel6581::new();

        for fc in [0usize, 256, 1024, 2047] {
            let mut stage = model.build_integrator();
            stage.set_vw(model.f0_dac(fc));

            for i in 0..5000u32 {
                let swing = ((i as f64) * 0.13).sin() * 8000.0;
                stage.solve(model.voice_dc() + swing);
                assert!(
                    stage.vx < stage.kvddt,
                    "vx {} escaped the operating region at fc={fc}",
                    stage.vx
                );
            }
        }
    }

    #[test]
    fn higher_cutoff_code_responds_faster() {
        let model = FilterModel6581::new();
        let silence = model.voice_dc();
        let step = silence + 6000.0;

        let mut deltas = Vec::new();
        for fc in [256usize, 1024, 2047] {
            let mut stage = model.build_integrator();
            stage.set_vw(model.f0_dac(fc));

            let mut settled = 0.0;
            for _ in 0..100_000 {
                settled = stage.solve(silence);
            }

            let mut after = 0.0;
            for _ in 0..30 {
                after = stage.solve(step);
            }
            deltas.push((fc, (after - settled).abs()));
        }

        for pair in deltas.windows(2) {
            let (fc_lo, d_lo) = pair[0];
            let (fc_hi, d_hi) = pair[1];
            assert!(
                d_hi > d_lo,
                "fc={fc_hi} should move further than fc={fc_lo} in 30 cycles: {d_hi} vs {d_lo}"
            );
        }
    }
}
