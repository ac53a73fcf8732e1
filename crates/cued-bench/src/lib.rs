//! CUED benchmark workloads
//!
//! Deterministic inputs shared by the criterion benches, so every bench
//! measures the same sentences, keyframes and feature streams across runs.

use cued_core::{CueResult, MediaTime};
use cued_phonetics::{syllabify, CueMapper};
use cued_recognizer::{FeatureStreams, HAND_POS_FEATURES, HAND_SHAPE_FEATURES, LIP_FEATURES};
use cued_time::TimingResolver;
use cued_visual::{build_keyframes, CueKeyframe, TransitionStyle};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Word counts for short, medium and long utterances
pub const SIZES: [usize; 3] = [5, 50, 500];

/// Average speaking time per syllable
pub const SYLLABLE_MILLIS: i64 = 250;

const WORDS: &[&str] = &[
    "bɔ̃ʒuʁ", "mɛʁsi", "boku", "lə", "pəti", "ʃa", "dɔʁ", "yn", "mɛzɔ̃", "blø", "paʁle", "kɔ̃plete",
    "fʁɑ̃sɛz", "ʃjɛ̃", "bʁœ̃", "ɡaɲe", "oʒuʁdɥi", "lɑ̃ɡ", "vwatyʁ", "pɛ̃",
];

/// Sentence of `words` words drawn from a fixed French word list
pub fn sentence(words: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..words)
        .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Clip length that gives every syllable of `ipa` the average time
pub fn clip_duration(ipa: &str) -> MediaTime {
    MediaTime::from_millis(syllabify(ipa).len().max(1) as i64 * SYLLABLE_MILLIS)
}

/// Keyframes for `ipa` with proportional timing
pub fn keyframes(ipa: &str, style: TransitionStyle) -> CueResult<Vec<CueKeyframe>> {
    let syllables = syllabify(ipa);
    let mappings = CueMapper::lpc().map_all(&syllables);
    let timing = TimingResolver::default().resolve(&syllables, clip_duration(ipa), None)?;
    build_keyframes(&syllables, &mappings, &timing, style)
}

/// Uniform noise in place of extracted features
pub fn random_streams(frames: usize, seed: u64) -> CueResult<FeatureStreams> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stream = |width: usize| Array2::from_shape_fn((frames, width), |_| rng.gen_range(-1.0f32..1.0));
    let hand_shape = stream(HAND_SHAPE_FEATURES);
    let hand_pos = stream(HAND_POS_FEATURES);
    let lips = stream(LIP_FEATURES);
    FeatureStreams::new(hand_shape, hand_pos, lips)
}
