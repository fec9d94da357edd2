//! Cutoff DAC model — the 6581's kinked 11-bit R-2R ladder.
//!
//! The 6581 DACs miss their termination resistor at bit 0 and have imperfect
//! resistor matching (2R/R ~ 2.20), so the output is non-monotonic around the
//! major bit transitions. MOSFET leakage keeps the output above zero even
//! with every bit off.

/// Measured 2R/R mismatch of the 6581 ladder.
const R2R_RATIO: f64 = 2.20;

/// MOSFET leakage fraction: bits that are "off" still conduct a little.
const LEAKAGE: f64 = 0.0075;

/// Parallel resistance of two branches.
fn parallel(r1: f64, r2: f64) -> f64 {
    (r1 * r2) / (r1 + r2)
}

/// Voltage contribution of a single set bit, by network analysis of the
/// unterminated ladder: walk the tail resistance up to the set bit, apply a
/// source transformation there, then walk voltage dividers up to the MSB.
fn bit_voltage(set_bit: usize, bits: usize) -> f64 {
    let r = 1.0;
    let r2 = R2R_RATIO;

    // Tail below bit 0 is an open circuit on the 6581.
    let mut tail: Option<f64> = None;
    for _ in 0..set_bit {
        tail = Some(match tail {
            None => r + r2,
            Some(rn) => r + parallel(r2, rn),
        });
    }

    let mut vn = 1.0;
    let mut rn = match tail {
        None => r2,
        Some(rn) => {
            let rp = parallel(r2, rn);
            vn = rp / r2;
            rp
        }
    };

    for _ in (set_bit + 1)..bits {
        rn += r;
        let i = vn / rn;
        rn = parallel(r2, rn);
        vn = rn * i;
    }

    vn
}

/// Normalized output table for a `bits`-wide kinked DAC: one entry per input
/// code, full-scale output 1.0.
pub fn kinked_dac_table(bits: usize) -> Vec<f64> {
    let bit_v: Vec<f64> = (0..bits).map(|b| bit_voltage(b, bits)).collect();
    let full_scale: f64 = bit_v.iter().sum();

    (0..1usize << bits)
        .map(|code| {
            let v: f64 = bit_v
                .iter()
                .enumerate()
                .map(|(b, &v)| if code & (1 << b) != 0 { v } else { v * LEAKAGE })
                .sum();
            v / full_scale
        })
        .collect()
}
