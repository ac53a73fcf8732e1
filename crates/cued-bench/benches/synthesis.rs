//! Benchmarks for trajectory synthesis

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cued_bench::{clip_duration, keyframes, sentence};
use cued_core::FrameRate;
use cued_visual::{FaceTrack, SynthesisConfig, Synthesizer, TransitionStyle};

fn bench_styles(c: &mut Criterion) {
    let ipa = sentence(50, 5);
    let total = clip_duration(&ipa);
    let faces = FaceTrack::default();

    let mut group = c.benchmark_group("synthesize_style");
    group.throughput(Throughput::Elements(FrameRate::PAL.frame_count(total) as u64));
    for (name, style) in [
        ("baseline", TransitionStyle::baseline()),
        ("default", TransitionStyle::default()),
        ("expressive", TransitionStyle::expressive()),
    ] {
        let synthesizer = Synthesizer::new(SynthesisConfig {
            style,
            ..SynthesisConfig::default()
        })
        .unwrap();
        let kfs = keyframes(&ipa, style).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &kfs, |b, kfs| {
            b.iter(|| synthesizer.synthesize(black_box(kfs), &faces, FrameRate::PAL, total))
        });
    }
    group.finish();
}

fn bench_frame_rates(c: &mut Criterion) {
    let ipa = sentence(50, 6);
    let total = clip_duration(&ipa);
    let faces = FaceTrack::default();
    let synthesizer = Synthesizer::new(SynthesisConfig::default()).unwrap();
    let kfs = keyframes(&ipa, TransitionStyle::default()).unwrap();

    let mut group = c.benchmark_group("synthesize_fps");
    for fps in [25.0, 30.0, 60.0] {
        let rate = FrameRate::new(fps).unwrap();
        group.throughput(Throughput::Elements(rate.frame_count(total) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fps), &rate, |b, rate| {
            b.iter(|| synthesizer.synthesize(black_box(&kfs), &faces, *rate, total))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_styles, bench_frame_rates);
criterion_main!(benches);
