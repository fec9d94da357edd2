/// Filter Renderer — MOS 6581 filter simulation WAV renderer.
///
/// Standalone CLI tool: drives a test oscillator through the 6581 filter
/// model and the C64 output stage at chip clock rate, decimates to 44.1 kHz
/// and writes the result to a WAV file.
use std::f64::consts::TAU;

use opensid_dsp::clock;
use opensid_dsp::external_filter::ExternalFilter;
use opensid_dsp::filter::Filter6581;
use opensid_dsp::model::FilterModel6581;

const SAMPLE_RATE: f64 = 44100.0;

#[derive(Clone, Copy)]
enum Signal {
    Sine,
    Saw,
    Pulse,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut signal = Signal::Saw;
    let mut freq: f64 = 440.0;
    let mut fc: u16 = 1024;
    let mut res: u8 = 0;
    let mut mode = 0x1u8; // lowpass
    let mut vol = 0xfu8;
    let mut duration: f64 = 2.0;
    let mut chip_clock = clock::PAL;
    let mut sweep = false;
    let mut curve: f64 = 0.5;
    let mut output_file = String::from("filter.wav");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--signal" | "-s" => {
                i += 1;
                signal = match args[i].as_str() {
                    "sine" => Signal::Sine,
                    "saw" => Signal::Saw,
                    "pulse" => Signal::Pulse,
                    other => {
                        eprintln!("Unknown signal: {other}");
                        std::process::exit(1)
                    }
                };
            }
            "--freq" | "-f" => {
                i += 1;
                freq = args[i].parse().expect("invalid frequency");
            }
            "--cutoff" | "-c" => {
                i += 1;
                fc = args[i].parse().expect("invalid cutoff code");
                if fc > 2047 {
                    eprintln!("Cutoff code {fc} out of range (0-2047)");
                    std::process::exit(1);
                }
            }
            "--res" | "-r" => {
                i += 1;
                res = args[i].parse().expect("invalid resonance");
                if res > 15 {
                    eprintln!("Resonance {res} out of range (0-15)");
                    std::process::exit(1);
                }
            }
            "--mode" | "-m" => {
                i += 1;
                mode = match args[i].as_str() {
                    "lp" => 0x1,
                    "bp" => 0x2,
                    "hp" => 0x4,
                    "notch" => 0x5,
                    other => {
                        eprintln!("Unknown mode: {other}");
                        std::process::exit(1)
                    }
                };
            }
            "--volume" | "-v" => {
                i += 1;
                vol = args[i].parse().expect("invalid volume");
                if vol > 15 {
                    eprintln!("Volume {vol} out of range (0-15)");
                    std::process::exit(1);
                }
            }
            "--duration" | "-d" => {
                i += 1;
                duration = args[i].parse().expect("invalid duration");
            }
            "--clock" => {
                i += 1;
                chip_clock = match args[i].as_str() {
                    "pal" => clock::PAL,
                    "ntsc" => clock::NTSC,
                    other => {
                        eprintln!("Unknown clock: {other}");
                        std::process::exit(1)
                    }
                };
            }
            "--curve" => {
                i += 1;
                curve = args[i].parse().expect("invalid curve");
            }
            "--sweep" => {
                sweep = true;
            }
            "--output" | "-o" => {
                i += 1;
                output_file = args[i].clone();
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    eprintln!(
        "Rendering {}s of {} at {freq} Hz, fc={fc} res={res} -> {output_file}",
        duration,
        match signal {
            Signal::Sine => "sine",
            Signal::Saw => "saw",
            Signal::Pulse => "pulse",
        }
    );

    let model = FilterModel6581::with_curve(curve);
    let samples = render(&model, signal, freq, fc, res, mode, vol, duration, chip_clock, sweep);

    let peak = samples.iter().map(|x| x.abs()).fold(0.0f64, f64::max);
    eprintln!("  Peak amplitude: {peak:.6} ({:.1} dBFS)", 20.0 * peak.log10());

    write_wav(&output_file, &samples, SAMPLE_RATE as u32);
    eprintln!("  Written: {output_file}");
}

#[allow(clippy::too_many_arguments)]
fn render(
    model: &FilterModel6581,
    signal: Signal,
    freq: f64,
    fc: u16,
    res: u8,
    mode: u8,
    vol: u8,
    duration: f64,
    chip_clock: f64,
    sweep: bool,
) -> Vec<f64> {
    let mut filter = Filter6581::new(model);
    filter.set_fc_lo((fc & 0x7) as u8);
    filter.set_fc_hi((fc >> 3) as u8);
    filter.set_res_filt((res << 4) | 0x1); // voice 1 through the filter
    filter.set_mode_vol((mode << 4) | vol);

    let mut ext = ExternalFilter::new();
    ext.set_clock_frequency(chip_clock);

    let amp = model.voice_scale() / 2.0;
    let gain = 1.0 / model.voice_scale();
    let cycles_per_sample = chip_clock / SAMPLE_RATE;
    let n_samples = (duration * SAMPLE_RATE) as usize;

    let mut samples = Vec::with_capacity(n_samples);
    let mut phase = 0.0f64;
    let mut carry = 0.0f64;

    for n in 0..n_samples {
        if sweep {
            // Sweep the cutoff register across its full range, exercising
            // the control path the way a register write does.
            let code = (n as f64 / n_samples as f64 * 2047.0) as u16;
            filter.set_fc_lo((code & 0x7) as u8);
            filter.set_fc_hi((code >> 3) as u8);
        }

        carry += cycles_per_sample;
        let n_cycles = carry as u32;
        carry -= n_cycles as f64;

        for _ in 0..n_cycles {
            phase += freq / chip_clock;
            if phase >= 1.0 {
                phase -= 1.0;
            }
            let s = match signal {
                Signal::Sine => (TAU * phase).sin(),
                Signal::Saw => 2.0 * phase - 1.0,
                Signal::Pulse => {
                    if phase < 0.5 {
                        1.0
                    } else {
                        -1.0
                    }
                }
            };
            filter.clock(s * amp, 0.0, 0.0, 0.0);
            ext.clock(filter.output());
        }

        samples.push(ext.output() * gain);
    }

    samples
}

fn write_wav(path: &str, samples: &[f64], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 24,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("failed to create WAV file");
    let scale = (1 << 23) as f64 - 1.0;
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        writer
            .write_sample((clamped * scale) as i32)
            .expect("failed to write sample");
    }
    writer.finalize().expect("failed to finalize WAV");
}

fn print_usage() {
    eprintln!(
        r#"Filter Renderer — MOS 6581 filter simulation WAV renderer

USAGE:
    filter-renderer [OPTIONS]

OPTIONS:
    -s, --signal <sine|saw|pulse>    Test oscillator shape (default: saw)
    -f, --freq <HZ>                  Oscillator frequency (default: 440)
    -c, --cutoff <0-2047>            Filter cutoff register (default: 1024)
    -r, --res <0-15>                 Resonance (default: 0)
    -m, --mode <lp|bp|hp|notch>      Filter mode (default: lp)
    -v, --volume <0-15>              Master volume (default: 15)
    -d, --duration <SECS>            Duration in seconds (default: 2.0)
        --clock <pal|ntsc>           Chip clock (default: pal)
        --curve <0.0-1.0>            Filter curve trim (default: 0.5)
        --sweep                      Sweep the cutoff register over the run
    -o, --output <PATH>              Output WAV file (default: filter.wav)
    -h, --help                       Print this help

EXAMPLES:
    filter-renderer -s saw -f 110 -c 300 -r 12 -o acid.wav
    filter-renderer --sweep -s saw -f 55 -r 15 -d 4.0 -o sweep.wav
    filter-renderer -s pulse -f 220 -m bp -c 800 -o band.wav"#
    );
}
