//! Benchmarks for timing resolution

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cued_bench::{clip_duration, sentence, SIZES};
use cued_core::MediaTime;
use cued_phonetics::syllabify;
use cued_time::{proportional_spans, Alignment, Interval, TimingResolver};

fn word_alignment(ipa: &str, total: MediaTime) -> Alignment {
    let words: Vec<&str> = ipa.split_whitespace().collect();
    let weights: Vec<u64> = words.iter().map(|w| w.chars().count() as u64).collect();
    Alignment::Words(
        proportional_spans(MediaTime::ZERO, total, &weights)
            .into_iter()
            .zip(words)
            .map(|((start, end), word)| Interval::new(start, end, word))
            .collect(),
    )
}

fn bench_fallback(c: &mut Criterion) {
    let resolver = TimingResolver::default();
    let mut group = c.benchmark_group("timing_fallback");
    for words in SIZES {
        let ipa = sentence(words, 3);
        let syllables = syllabify(&ipa);
        let total = clip_duration(&ipa);
        group.bench_with_input(BenchmarkId::from_parameter(words), &syllables, |b, syllables| {
            b.iter(|| resolver.resolve(black_box(syllables), total, None))
        });
    }
    group.finish();
}

fn bench_word_aligned(c: &mut Criterion) {
    let resolver = TimingResolver::default();
    let mut group = c.benchmark_group("timing_word_aligned");
    for words in SIZES {
        let ipa = sentence(words, 4);
        let syllables = syllabify(&ipa);
        let total = clip_duration(&ipa);
        let alignment = word_alignment(&ipa, total);
        group.bench_with_input(BenchmarkId::from_parameter(words), &syllables, |b, syllables| {
            b.iter(|| resolver.resolve(black_box(syllables), total, Some(&alignment)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fallback, bench_word_aligned);
criterion_main!(benches);
