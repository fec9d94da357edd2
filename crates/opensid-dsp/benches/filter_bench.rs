//! Benchmarks for the 6581 filter model.
//!
//! Run with: cargo bench
//!
//! The filter is clocked at chip rate (~985 kHz PAL), so every second of
//! audio costs ~985k solve steps per integrator stage, two stages per
//! filter. Real-time playback at 44.1 kHz therefore needs a full filter
//! cycle to stay well under 1 µs.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use opensid_dsp::filter::Filter6581;
use opensid_dsp::model::FilterModel6581;

fn bench_integrator(c: &mut Criterion) {
    let model = FilterModel6581::new();
    let mut stage = model.build_integrator();
    stage.set_vw(model.f0_dac(1024));
    let dc = model.voice_dc();

    c.bench_function("integrator/solve_1k_cycles", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for i in 0..1000u32 {
                acc += stage.solve(black_box(dc + (i % 700) as f64));
            }
            acc
        })
    });
}

fn bench_filter(c: &mut Criterion) {
    let model = FilterModel6581::new();
    let mut filter = Filter6581::new(&model);
    filter.set_fc_hi(0x80);
    filter.set_res_filt(0x8f);
    filter.set_mode_vol(0x1f);
    let a = model.voice_scale() / 2.0;

    c.bench_function("filter/clock_1k_cycles", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for i in 0..1000u32 {
                // Cheap saw-ish drive, one period per 256 cycles.
                let s = ((i % 256) as f64 / 128.0 - 1.0) * a;
                filter.clock(black_box(s), 0.0, 0.0, 0.0);
                acc += filter.output();
            }
            acc
        })
    });
}

fn bench_model_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("model");
    group.sample_size(10);
    group.bench_function("build", |b| b.iter(FilterModel6581::new));
    group.finish();
}

criterion_group!(benches, bench_integrator, bench_filter, bench_model_build);
criterion_main!(benches);
