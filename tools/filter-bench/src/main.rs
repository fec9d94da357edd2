/// Filter Bench — MOS 6581 filter model measurement CLI.
///
/// Measures the simulated filter the way a curve tracer measures the real
/// chip: steady-state gain at a frequency, full frequency-response sweeps,
/// and integrator step response.
///
/// Usage:
///   filter-bench gain [--fc N] [--res N] [--mode M] [--freq F]
///   filter-bench sweep [--fc N] [--res N] [--mode M] [--points N]
///   filter-bench step [--fc N]
use std::f64::consts::TAU;

use opensid_dsp::filter::Filter6581;
use opensid_dsp::model::FilterModel6581;

/// Measurement clock (Hz). Close enough to both PAL and NTSC machines.
const CLOCK: f64 = 1.0e6;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "gain" => cmd_gain(&args[2..]),
        "sweep" => cmd_sweep(&args[2..]),
        "step" => cmd_step(&args[2..]),
        _ => {
            eprintln!("Unknown subcommand: {}", args[1]);
            print_usage();
        }
    }
}

fn print_usage() {
    eprintln!("Filter Bench — MOS 6581 filter model measurement");
    eprintln!();
    eprintln!("Subcommands:");
    eprintln!("  gain     Steady-state gain at a single frequency");
    eprintln!("  sweep    Frequency response sweep (CSV on stdout)");
    eprintln!("  step     Integrator step response settling");
    eprintln!();
    eprintln!("Common flags: --fc <0-2047> --res <0-15> --mode <lp|bp|hp>");
}

fn parse_flag(args: &[String], flag: &str, default: f64) -> f64 {
    for i in 0..args.len().saturating_sub(1) {
        if args[i] == flag {
            return args[i + 1].parse().unwrap_or(default);
        }
    }
    default
}

fn parse_flag_str<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    for i in 0..args.len().saturating_sub(1) {
        if args[i] == flag {
            return &args[i + 1];
        }
    }
    default
}

fn mode_bits(mode: &str) -> u8 {
    match mode {
        "lp" => 0x1,
        "bp" => 0x2,
        "hp" => 0x4,
        other => {
            eprintln!("Unknown mode: {other}");
            std::process::exit(1)
        }
    }
}

fn build_filter<'a>(model: &'a FilterModel6581, fc: u16, res: u8, mode: u8) -> Filter6581<'a> {
    let mut filter = Filter6581::new(model);
    filter.set_fc_lo((fc & 0x7) as u8);
    filter.set_fc_hi((fc >> 3) as u8);
    filter.set_res_filt((res << 4) | 0x1);
    filter.set_mode_vol((mode << 4) | 0xf);
    filter
}

/// Steady-state amplitude gain of a sine through voice 1.
fn measure_gain(filter: &mut Filter6581<'_>, amp: f64, freq: f64) -> f64 {
    // Settle for 50 ms or 4 periods, whichever is longer.
    let settle = ((CLOCK * 0.05) as usize).max((4.0 * CLOCK / freq) as usize);
    // Measure over at least 2 full periods.
    let measure = ((CLOCK * 0.02) as usize).max((2.0 * CLOCK / freq) as usize);

    let mut phase = 0.0f64;
    let mut tick = |filter: &mut Filter6581<'_>| {
        phase += freq / CLOCK;
        phase %= 1.0;
        filter.clock(amp * (TAU * phase).sin(), 0.0, 0.0, 0.0);
    };

    for _ in 0..settle {
        tick(filter);
    }
    let (mut lo, mut hi) = (f64::MAX, f64::MIN);
    for _ in 0..measure {
        tick(filter);
        lo = lo.min(filter.output());
        hi = hi.max(filter.output());
    }
    (hi - lo) / (2.0 * amp)
}

fn cmd_gain(args: &[String]) {
    let fc = parse_flag(args, "--fc", 1024.0) as u16;
    let res = parse_flag(args, "--res", 0.0) as u8;
    let mode = mode_bits(parse_flag_str(args, "--mode", "lp"));
    let freq = parse_flag(args, "--freq", 1000.0);

    let model = FilterModel6581::new();
    let mut filter = build_filter(&model, fc, res, mode);
    let gain = measure_gain(&mut filter, model.voice_scale() / 2.0, freq);

    println!(
        "fc={fc} res={res} freq={freq} Hz: gain = {gain:.4} ({:.2} dB)",
        20.0 * gain.log10()
    );
}

fn cmd_sweep(args: &[String]) {
    let fc = parse_flag(args, "--fc", 1024.0) as u16;
    let res = parse_flag(args, "--res", 0.0) as u8;
    let mode = mode_bits(parse_flag_str(args, "--mode", "lp"));
    let start = parse_flag(args, "--start", 30.0);
    let end = parse_flag(args, "--end", 16000.0);
    let points = parse_flag(args, "--points", 25.0) as usize;

    let model = FilterModel6581::new();
    let amp = model.voice_scale() / 2.0;

    eprintln!("Sweeping {points} points, {start}-{end} Hz, fc={fc} res={res}");
    println!("freq_hz,gain,gain_db");
    for p in 0..points {
        let t = p as f64 / (points - 1) as f64;
        let freq = start * (end / start).powf(t);

        // Fresh filter per point: resonance can keep the loop ringing from
        // the previous frequency.
        let mut filter = build_filter(&model, fc, res, mode);
        let gain = measure_gain(&mut filter, amp, freq);
        println!("{freq:.1},{gain:.5},{:.2}", 20.0 * gain.log10());
    }
}

fn cmd_step(args: &[String]) {
    let fc = parse_flag(args, "--fc", 1024.0) as u16;

    let model = FilterModel6581::new();
    let mut stage = model.build_integrator();
    stage.set_vw(model.f0_dac(fc as usize));

    let silence = model.voice_dc();
    let step = silence + model.voice_scale() / 2.0;

    let mut settled = 0.0;
    for _ in 0..(CLOCK * 0.1) as usize {
        settled = stage.solve(silence);
    }

    let mut target = 0.0;
    let mut probe = model.build_integrator();
    probe.set_vw(model.f0_dac(fc as usize));
    for _ in 0..(CLOCK * 0.1) as usize {
        target = probe.solve(step);
    }

    // Count cycles until the output covers 99% of the step.
    let span = target - settled;
    let mut cycles = 0u64;
    loop {
        let out = stage.solve(step);
        cycles += 1;
        if (out - settled).abs() >= 0.99 * span.abs() || cycles > 10_000_000 {
            break;
        }
    }

    println!(
        "fc={fc}: 99% settling in {cycles} cycles ({:.2} ms at 1 MHz)",
        cycles as f64 * 1e3 / CLOCK
    );
}
