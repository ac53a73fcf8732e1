//! End-to-end Integration Test Suite
//!
//! Runs the reference corpus through the full pipeline and checks the
//! properties every trajectory must have, whatever the style:
//! - one frame per output tick, indices contiguous from zero
//! - timestamps increasing and inside the clip
//! - finite landmarks and opacity within the configured range
//! - cue targets appear in syllable order, starting and ending on the
//!   first and last syllable's cue

use std::sync::Arc;

use cued_core::{CueResult, CueTarget, FrameRate, MediaTime};
use cued_phonetics::{syllabify, CueMapper};
use cued_runtime::{BatchConfig, BatchRunner, BatchSummary, CancelFlag, JobOutput, Pipeline, PipelineConfig, VideoJob};
use cued_time::{Alignment, Interval};
use cued_visual::{SynthesisConfig, Trajectory};

use crate::corpus::{Utterance, CORPUS};
use crate::fixtures::face_track;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Timing information handed to each job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMode {
    /// Proportional fallback timing
    None,
    Words,
    Phones,
    /// Out-of-order intervals the resolver must reject
    Corrupt,
}

#[derive(Debug, Clone)]
pub struct IntegrationTestConfig {
    pub frame_rate: f64,
    pub alignment: AlignmentMode,
    pub synthesis: SynthesisConfig,
    /// Share of frames without a face detection
    pub face_dropout: f64,
    pub seed: u64,
}

impl Default for IntegrationTestConfig {
    fn default() -> Self {
        Self {
            frame_rate: 25.0,
            alignment: AlignmentMode::Words,
            synthesis: SynthesisConfig::default(),
            face_dropout: 0.0,
            seed: 42,
        }
    }
}

impl IntegrationTestConfig {
    /// Baseline style, no alignment
    pub fn minimal() -> Self {
        Self {
            alignment: AlignmentMode::None,
            synthesis: SynthesisConfig::baseline(),
            ..Self::default()
        }
    }

    pub fn standard() -> Self {
        Self::default()
    }

    /// Higher frame rate, phone alignment, noisy face track
    pub fn stress() -> Self {
        Self {
            frame_rate: 60.0,
            alignment: AlignmentMode::Phones,
            face_dropout: 0.3,
            ..Self::default()
        }
    }

    /// Every alignment is rejected
    pub fn degraded() -> Self {
        Self {
            alignment: AlignmentMode::Corrupt,
            ..Self::default()
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct IntegrationTestResult {
    pub utterances: usize,
    pub frames: usize,
    /// Jobs that ran on proportional timing
    pub fallbacks: usize,
    pub unknown_phonemes: Vec<String>,
    pub violations: Vec<String>,
}

impl IntegrationTestResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub struct IntegrationTestHarness {
    config: IntegrationTestConfig,
    pipeline: Arc<Pipeline>,
    frame_rate: FrameRate,
}

impl IntegrationTestHarness {
    pub fn new(config: IntegrationTestConfig) -> CueResult<Self> {
        let pipeline_config = PipelineConfig {
            frame_rate: config.frame_rate,
            synthesis: config.synthesis.clone(),
            ..PipelineConfig::default()
        };
        let frame_rate = pipeline_config.frame_rate()?;
        let pipeline = Arc::new(Pipeline::new(&pipeline_config)?);
        Ok(Self {
            config,
            pipeline,
            frame_rate,
        })
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// One job per corpus utterance
    pub fn jobs(&self) -> Vec<VideoJob> {
        CORPUS
            .iter()
            .enumerate()
            .map(|(i, utterance)| {
                let duration = utterance.duration();
                let frames = self.frame_rate.frame_count(duration);
                let job = VideoJob::transcript(utterance.text, utterance.ipa, duration)
                    .with_faces(face_track(frames, self.config.face_dropout, self.config.seed.wrapping_add(i as u64)));
                match self.alignment(utterance) {
                    Some(alignment) => job.with_alignment(alignment),
                    None => job,
                }
            })
            .collect()
    }

    fn alignment(&self, utterance: &Utterance) -> Option<Alignment> {
        match self.config.alignment {
            AlignmentMode::None => None,
            AlignmentMode::Words => Some(utterance.word_alignment()),
            AlignmentMode::Phones => Some(utterance.phone_alignment()),
            AlignmentMode::Corrupt => {
                let mut intervals: Vec<Interval> = utterance.phone_alignment().intervals().to_vec();
                intervals.reverse();
                Some(Alignment::Phones(intervals))
            }
        }
    }

    /// Run every utterance synchronously and check each trajectory
    pub fn run(&self) -> IntegrationTestResult {
        let mut result = IntegrationTestResult {
            utterances: CORPUS.len(),
            frames: 0,
            fallbacks: 0,
            unknown_phonemes: Vec::new(),
            violations: Vec::new(),
        };

        for (utterance, job) in CORPUS.iter().zip(self.jobs()) {
            match self.pipeline.run(&job, &CancelFlag::new()) {
                Ok(output) => self.record(utterance, &output, &mut result),
                Err(e) => result
                    .violations
                    .push(format!("{}: pipeline failed: {}", utterance.text, e)),
            }
        }
        result
    }

    /// Run the corpus as one batch
    pub async fn run_batch(&self, batch: BatchConfig) -> CueResult<BatchSummary> {
        let runner = BatchRunner::new(Arc::clone(&self.pipeline), batch)?;
        Ok(runner.run(self.jobs()).await)
    }

    fn record(&self, utterance: &Utterance, output: &JobOutput, result: &mut IntegrationTestResult) {
        result.frames += output.trajectory.len();
        if output.fallback.is_some() {
            result.fallbacks += 1;
        }
        result.unknown_phonemes.extend(output.unknown_phonemes.iter().cloned());

        let expected = expected_targets(utterance.ipa);
        let min_alpha = if self.config.synthesis.style.transparency {
            self.config.synthesis.transparency_min_alpha
        } else {
            1.0
        };
        for violation in check_trajectory(&output.trajectory, self.frame_rate, utterance.duration(), &expected, min_alpha) {
            result.violations.push(format!("{}: {}", utterance.text, violation));
        }
    }
}

/// Cue target of each syllable, in order
pub fn expected_targets(ipa: &str) -> Vec<CueTarget> {
    let mapper = CueMapper::lpc();
    syllabify(ipa).iter().map(|s| mapper.map(s).target).collect()
}

/// Every invariant a trajectory breaks
pub fn check_trajectory(
    trajectory: &Trajectory,
    frame_rate: FrameRate,
    duration: MediaTime,
    expected: &[CueTarget],
    min_alpha: f32,
) -> Vec<String> {
    let mut violations = Vec::new();
    let frames = trajectory.frames();

    let count = frame_rate.frame_count(duration);
    if frames.len() != count {
        violations.push(format!("{} frames, expected {}", frames.len(), count));
    }
    if !trajectory.is_contiguous() {
        violations.push("frame indices are not contiguous".into());
    }
    if frames.windows(2).any(|w| w[1].timestamp <= w[0].timestamp) {
        violations.push("timestamps do not increase".into());
    }
    if frames.iter().any(|f| f.timestamp < MediaTime::ZERO || f.timestamp >= duration) {
        violations.push("timestamp outside the clip".into());
    }
    if let Some(f) = frames.iter().find(|f| !f.landmarks.is_finite()) {
        violations.push(format!("non-finite landmarks at frame {}", f.index.as_usize()));
    }
    if let Some(f) = frames
        .iter()
        .find(|f| f.alpha < min_alpha - 1e-4 || f.alpha > 1.0 + 1e-4)
    {
        violations.push(format!("alpha {} out of range at frame {}", f.alpha, f.index.as_usize()));
    }

    let observed = dedup(frames.iter().map(|f| CueTarget::new(f.shape, f.position)));
    let expected = dedup(expected.iter().copied());
    if !is_subsequence(&observed, &expected) {
        violations.push(format!("cue order {:?} does not follow {:?}", observed, expected));
    }
    if observed.first() != expected.first() {
        violations.push("first frame is not the first cue".into());
    }
    if observed.last() != expected.last() {
        violations.push("last frame does not hold the last cue".into());
    }
    violations
}

fn dedup(targets: impl Iterator<Item = CueTarget>) -> Vec<CueTarget> {
    let mut out: Vec<CueTarget> = Vec::new();
    for target in targets {
        if out.last() != Some(&target) {
            out.push(target);
        }
    }
    out
}

fn is_subsequence(needle: &[CueTarget], haystack: &[CueTarget]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|n| rest.any(|h| h == n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cued_visual::{Easing, TransitionStyle};
    use proptest::prelude::*;

    #[test]
    fn test_minimal() {
        let result = IntegrationTestHarness::new(IntegrationTestConfig::minimal()).unwrap().run();
        assert!(result.passed(), "{:?}", result.violations);
        assert_eq!(result.fallbacks, CORPUS.len());
        assert!(result.unknown_phonemes.is_empty());
    }

    #[test]
    fn test_standard() {
        let result = IntegrationTestHarness::new(IntegrationTestConfig::standard()).unwrap().run();
        assert!(result.passed(), "{:?}", result.violations);
        assert_eq!(result.fallbacks, 0);
    }

    #[test]
    fn test_stress() {
        let result = IntegrationTestHarness::new(IntegrationTestConfig::stress()).unwrap().run();
        assert!(result.passed(), "{:?}", result.violations);
        assert_eq!(result.fallbacks, 0);
    }

    #[test]
    fn test_degraded_alignment_falls_back() {
        let result = IntegrationTestHarness::new(IntegrationTestConfig::degraded()).unwrap().run();
        assert!(result.passed(), "{:?}", result.violations);
        assert_eq!(result.fallbacks, CORPUS.len());
    }

    #[test]
    fn test_every_style() {
        for easing in Easing::all() {
            let mut synthesis = SynthesisConfig::default();
            synthesis.style = TransitionStyle {
                easing: *easing,
                ..TransitionStyle::expressive()
            };
            let config = IntegrationTestConfig {
                synthesis,
                ..IntegrationTestConfig::default()
            };
            let result = IntegrationTestHarness::new(config).unwrap().run();
            assert!(result.passed(), "{}: {:?}", easing.name(), result.violations);
        }
    }

    #[test]
    fn test_check_trajectory_flags_wrong_order() {
        let harness = IntegrationTestHarness::new(IntegrationTestConfig::minimal()).unwrap();
        let job = &harness.jobs()[0];
        let output = harness.pipeline().run(job, &CancelFlag::new()).unwrap();

        let mut reversed = expected_targets(CORPUS[0].ipa);
        reversed.reverse();
        let violations = check_trajectory(&output.trajectory, FrameRate::PAL, CORPUS[0].duration(), &reversed, 1.0);
        assert!(!violations.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_any_frame_rate(fps in 20.0f64..90.0, dropout in 0.0f64..0.5, seed in any::<u64>()) {
            let config = IntegrationTestConfig {
                frame_rate: fps,
                face_dropout: dropout,
                seed,
                ..IntegrationTestConfig::default()
            };
            let result = IntegrationTestHarness::new(config).unwrap().run();
            prop_assert!(result.passed(), "{:?}", result.violations);
        }
    }

    #[tokio::test]
    async fn test_batch_run() {
        let harness = IntegrationTestHarness::new(IntegrationTestConfig::standard()).unwrap();
        let summary = harness
            .run_batch(BatchConfig {
                max_concurrent: 3,
                ..BatchConfig::default()
            })
            .await
            .unwrap();
        assert_eq!(summary.len(), CORPUS.len());
        assert!(summary.all_succeeded());
    }
}
