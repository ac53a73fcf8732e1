//! Timing Fuzzer - Randomised checks for timing resolution
//!
//! Generates pronounceable IPA strings with word alignments, some of them
//! corrupted, and checks that:
//! - resolution never fails for a positive clip length
//! - valid alignments are used, corrupted ones fall back
//! - anchors are ordered, do not overlap and stay inside the clip
//! - keyframes and synthesized frames follow from the anchors

use cued_core::{CueError, CueResult, FrameRate, MediaTime};
use cued_phonetics::{syllabify, CueMapper};
use cued_time::{proportional_spans, Alignment, Interval, PhaseRatios, TimingResolution, TimingResolver};
use cued_visual::{build_keyframes, FaceTrack, SynthesisConfig, Synthesizer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const ONSETS: &[&str] = &[
    "p", "b", "t", "d", "k", "ɡ", "f", "v", "s", "z", "ʃ", "ʒ", "m", "n", "ɲ", "l", "ʁ", "j", "w",
];
const VOWELS: &[&str] = &[
    "a", "e", "i", "o", "u", "y", "ɛ", "ɔ", "ø", "œ", "ə", "ɑ̃", "ɛ̃", "ɔ̃", "œ̃",
];
const CODAS: &[&str] = &["ʁ", "l", "s", "k", "t", "m"];

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of generated utterances
    pub cases: usize,
    pub max_words: usize,
    pub max_syllables_per_word: usize,
    /// Probability an alignment is corrupted
    pub corrupt_prob: f64,
    /// Probability a case has no alignment at all
    pub missing_prob: f64,
    /// Output rate used for the synthesis check
    pub frame_rate: f64,
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            cases: 200,
            max_words: 6,
            max_syllables_per_word: 3,
            corrupt_prob: 0.3,
            missing_prob: 0.1,
            frame_rate: 10.0,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            cases: 50,
            ..Self::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            cases: 2000,
            max_words: 12,
            max_syllables_per_word: 4,
            ..Self::default()
        }
    }
}

/// How a generated alignment was damaged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corruption {
    /// One interval fewer than there are words
    DropLast,
    /// Last interval runs past the clip
    PastEnd,
    /// First two intervals swapped
    Swap,
}

#[derive(Clone, Debug)]
pub struct FuzzCase {
    pub ipa: String,
    pub duration: MediaTime,
    pub alignment: Option<Alignment>,
    pub corruption: Option<Corruption>,
}

impl FuzzCase {
    /// Should the resolver accept this case's alignment?
    pub fn expects_alignment(&self) -> bool {
        self.alignment.is_some() && self.corruption.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FuzzResult {
    pub cases: usize,
    pub aligned: usize,
    pub fallbacks: usize,
    pub violations: Vec<String>,
}

impl FuzzResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct TimingFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
    resolver: TimingResolver,
    mapper: CueMapper,
    synthesizer: Synthesizer,
    frame_rate: FrameRate,
}

impl TimingFuzzer {
    pub fn new(config: FuzzerConfig) -> CueResult<Self> {
        let frame_rate = FrameRate::new(config.frame_rate).ok_or_else(|| {
            CueError::InvalidConfig(format!("fuzzer frame rate {} is not positive", config.frame_rate))
        })?;
        Ok(TimingFuzzer {
            rng: StdRng::seed_from_u64(config.seed),
            resolver: TimingResolver::new(PhaseRatios::default())?,
            mapper: CueMapper::lpc(),
            synthesizer: Synthesizer::new(SynthesisConfig::default())?,
            frame_rate,
            config,
        })
    }

    pub fn generate(&mut self) -> FuzzCase {
        let words = self.rng.gen_range(1..=self.config.max_words);
        let ipa = (0..words)
            .map(|_| self.word())
            .collect::<Vec<_>>()
            .join(" ");
        let syllables = syllabify(&ipa).len().max(1) as i64;
        let duration = MediaTime::from_millis(syllables * self.rng.gen_range(80..400));

        if self.rng.gen_bool(self.config.missing_prob) {
            return FuzzCase {
                ipa,
                duration,
                alignment: None,
                corruption: None,
            };
        }

        let mut intervals = word_intervals(&ipa, duration);
        let corruption = if self.rng.gen_bool(self.config.corrupt_prob) {
            let kinds = if intervals.len() >= 2 {
                &[Corruption::DropLast, Corruption::PastEnd, Corruption::Swap][..]
            } else {
                &[Corruption::DropLast, Corruption::PastEnd][..]
            };
            kinds.choose(&mut self.rng).copied()
        } else {
            None
        };
        if let Some(kind) = corruption {
            corrupt(&mut intervals, kind, duration);
        }

        FuzzCase {
            ipa,
            duration,
            alignment: Some(Alignment::Words(intervals)),
            corruption,
        }
    }

    fn word(&mut self) -> String {
        let count = self.rng.gen_range(1..=self.config.max_syllables_per_word);
        let mut word = String::new();
        for i in 0..count {
            // A closing consonant before another onset makes a VC|CV boundary
            if i > 0 && self.rng.gen_bool(0.2) {
                word.push_str(CODAS.choose(&mut self.rng).copied().unwrap_or("ʁ"));
            }
            if self.rng.gen_bool(0.8) {
                word.push_str(ONSETS.choose(&mut self.rng).copied().unwrap_or("p"));
            }
            word.push_str(VOWELS.choose(&mut self.rng).copied().unwrap_or("a"));
        }
        if self.rng.gen_bool(0.3) {
            word.push_str(CODAS.choose(&mut self.rng).copied().unwrap_or("ʁ"));
        }
        word
    }

    pub fn run(&mut self) -> FuzzResult {
        let mut result = FuzzResult::default();
        for i in 0..self.config.cases {
            let case = self.generate();
            result.cases += 1;
            for violation in self.check(&case, &mut result) {
                result
                    .violations
                    .push(format!("case {} '{}': {}", i, case.ipa, violation));
            }
        }
        result
    }

    fn check(&self, case: &FuzzCase, result: &mut FuzzResult) -> Vec<String> {
        let mut violations = Vec::new();
        let syllables = syllabify(&case.ipa);

        let timing = match self.resolver.resolve(&syllables, case.duration, case.alignment.as_ref()) {
            Ok(timing) => timing,
            Err(e) => {
                violations.push(format!("resolution failed: {}", e));
                return violations;
            }
        };

        match (&timing, case.expects_alignment()) {
            (TimingResolution::Aligned(_), true) => result.aligned += 1,
            (TimingResolution::Fallback { .. }, false) => result.fallbacks += 1,
            (TimingResolution::Aligned(_), false) => {
                violations.push(format!("{:?} alignment was accepted", case.corruption))
            }
            (TimingResolution::Fallback { reason, .. }, true) => {
                violations.push(format!("valid alignment rejected: {}", reason))
            }
        }

        if timing.len() != syllables.len() {
            violations.push(format!("{} anchor sets for {} syllables", timing.len(), syllables.len()));
        }
        if !timing.is_consistent() {
            violations.push("anchors overlap or are out of order".into());
        }
        if timing
            .anchors()
            .iter()
            .any(|a| a.a1 < MediaTime::ZERO || a.a3 > case.duration)
        {
            violations.push("anchor outside the clip".into());
        }

        let mappings = self.mapper.map_all(&syllables);
        if mappings.iter().any(|m| m.has_unknown()) {
            violations.push("generated phoneme has no cue".into());
        }
        let keyframes = match build_keyframes(&syllables, &mappings, &timing, self.synthesizer.config().style) {
            Ok(keyframes) => keyframes,
            Err(e) => {
                violations.push(format!("keyframes: {}", e));
                return violations;
            }
        };
        if keyframes.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
            violations.push("keyframe timestamps go backwards".into());
        }

        match self
            .synthesizer
            .synthesize(&keyframes, &FaceTrack::default(), self.frame_rate, case.duration)
        {
            Ok(trajectory) => {
                if trajectory.len() != self.frame_rate.frame_count(case.duration) || !trajectory.is_contiguous() {
                    violations.push(format!("trajectory has {} frames", trajectory.len()));
                }
            }
            Err(e) => violations.push(format!("synthesis failed: {}", e)),
        }
        violations
    }
}

/// Word intervals with a pause after each word
fn word_intervals(ipa: &str, duration: MediaTime) -> Vec<Interval> {
    let words: Vec<&str> = ipa.split_whitespace().collect();
    let weights: Vec<u64> = words.iter().map(|w| w.chars().count() as u64).collect();
    proportional_spans(MediaTime::ZERO, duration, &weights)
        .into_iter()
        .zip(words)
        .map(|((start, end), word)| Interval::new(start, start.lerp(end, 0.85), word))
        .collect()
}

fn corrupt(intervals: &mut Vec<Interval>, kind: Corruption, duration: MediaTime) {
    match kind {
        Corruption::DropLast => {
            intervals.pop();
        }
        Corruption::PastEnd => {
            if let Some(last) = intervals.last_mut() {
                last.end = MediaTime::from_micros(duration.as_micros() + 1_000);
            }
        }
        Corruption::Swap => intervals.swap(0, 1),
    }
}
