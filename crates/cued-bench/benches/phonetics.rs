//! Benchmarks for syllabification and cue mapping

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cued_bench::{sentence, SIZES};
use cued_phonetics::{syllabify, CueMapper};

fn bench_syllabify(c: &mut Criterion) {
    let mut group = c.benchmark_group("syllabify");
    for words in SIZES {
        let ipa = sentence(words, 1);
        group.throughput(Throughput::Elements(words as u64));
        group.bench_with_input(BenchmarkId::from_parameter(words), &ipa, |b, ipa| {
            b.iter(|| syllabify(black_box(ipa)))
        });
    }
    group.finish();
}

fn bench_map_all(c: &mut Criterion) {
    let mapper = CueMapper::lpc();
    let mut group = c.benchmark_group("cue_map");
    for words in SIZES {
        let syllables = syllabify(&sentence(words, 2));
        group.throughput(Throughput::Elements(syllables.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(words), &syllables, |b, syllables| {
            b.iter(|| mapper.map_all(black_box(syllables)))
        });
    }
    group.finish();
}

fn bench_mapper_build(c: &mut Criterion) {
    c.bench_function("cue_mapper_lpc", |b| b.iter(CueMapper::lpc));
}

criterion_group!(benches, bench_syllabify, bench_map_all, bench_mapper_build);
criterion_main!(benches);
