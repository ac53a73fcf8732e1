//! Per-video pipeline
//!
//! ```text
//! source ─► phonemes ─► syllabify ─► map cues ─► resolve timing
//!                                                     │
//!        output file ◄── synthesize ◄── keyframes ◄───┘
//! ```
//!
//! Every stage runs synchronously on the calling thread. The cancel flag is
//! checked between stages; a cancelled job never leaves a partial output.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cued_core::{tokens_to_ipa, CueError, CueResult, FrameRate, MediaTime, PhonemeToken};
use cued_phonetics::{syllabify, CueMapper};
use cued_recognizer::{FeatureExtractor, FeatureStreams, LandmarkFrame, Transcriber, WORD_SEPARATOR};
use cued_time::{Alignment, FallbackReason, TimingResolution, TimingResolver};
use cued_visual::{build_keyframes, FaceTrack, HandShapeLibrary, Synthesizer, Trajectory};
use tracing::{debug, info, warn};

use crate::PipelineConfig;

/// Where a job's phonemes come from
#[derive(Debug, Clone)]
pub enum JobSource {
    /// Phonemized transcript; words separated by whitespace
    Transcript(String),
    /// Phoneme tokens; `_` separates words
    Phonemes(Vec<PhonemeToken>),
    /// Recognizer input
    Features(FeatureStreams),
    /// Raw landmarks, turned into recognizer input first
    Landmarks(Vec<LandmarkFrame>),
}

/// One video to process
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub name: String,
    pub source: JobSource,
    pub duration: MediaTime,
    pub alignment: Option<Alignment>,
    pub faces: FaceTrack,
    /// Trajectory JSON destination; kept in memory only when unset
    pub output: Option<PathBuf>,
}

impl VideoJob {
    pub fn new(name: impl Into<String>, source: JobSource, duration: MediaTime) -> Self {
        Self {
            name: name.into(),
            source,
            duration,
            alignment: None,
            faces: FaceTrack::default(),
            output: None,
        }
    }

    pub fn transcript(name: impl Into<String>, ipa: impl Into<String>, duration: MediaTime) -> Self {
        Self::new(name, JobSource::Transcript(ipa.into()), duration)
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn with_faces(mut self, faces: FaceTrack) -> Self {
        self.faces = faces;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Shared cancellation flag for one job
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Cancelled` once the flag is raised
    pub fn check(&self, stage: &str) -> CueResult<()> {
        if self.is_cancelled() {
            Err(CueError::Cancelled(format!("before {}", stage)))
        } else {
            Ok(())
        }
    }
}

/// Result of one job
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub name: String,
    pub syllables: usize,
    /// Phoneme symbols the cue table did not know
    pub unknown_phonemes: Vec<String>,
    /// Why timing fell back, if it did
    pub fallback: Option<FallbackReason>,
    pub trajectory: Trajectory,
    pub written: Option<PathBuf>,
}

/// The cue pipeline with its stages built once
pub struct Pipeline {
    frame_rate: FrameRate,
    mapper: CueMapper,
    resolver: TimingResolver,
    synthesizer: Synthesizer,
    transcriber: Option<Transcriber>,
    extractor: FeatureExtractor,
}

impl Pipeline {
    /// Build every stage; loads hand-shape templates and the recognizer when configured
    pub fn new(config: &PipelineConfig) -> CueResult<Self> {
        config.validate()?;
        let library = match &config.handshapes_dir {
            Some(dir) => HandShapeLibrary::load_dir(dir)?,
            None => HandShapeLibrary::builtin(),
        };
        let transcriber = match &config.recognizer {
            Some(files) => Some(Transcriber::load(
                &files.weights,
                &files.vocabulary,
                files.hidden_size,
                files.num_layers,
            )?),
            None => None,
        };

        Ok(Self {
            frame_rate: config.frame_rate()?,
            mapper: CueMapper::lpc(),
            resolver: TimingResolver::new(config.timing)?,
            synthesizer: Synthesizer::with_library(config.synthesis.clone(), library)?,
            transcriber,
            extractor: FeatureExtractor::new(),
        })
    }

    pub fn with_transcriber(mut self, transcriber: Transcriber) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    /// Phonemized text for the job's source
    pub fn phonemes(&self, source: &JobSource) -> CueResult<String> {
        let ipa = match source {
            JobSource::Transcript(text) => text.trim().to_string(),
            JobSource::Phonemes(tokens) => tokens_to_ipa(tokens, WORD_SEPARATOR),
            JobSource::Features(streams) => self.recognize(streams)?,
            JobSource::Landmarks(frames) => {
                let streams = self.extractor.extract_streams(frames)?;
                self.recognize(&streams)?
            }
        };
        if ipa.is_empty() {
            return Err(CueError::InputMissing("no phonemes to cue".into()));
        }
        Ok(ipa)
    }

    fn recognize(&self, streams: &FeatureStreams) -> CueResult<String> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            CueError::RecognizerLoadFailure("no recognizer loaded; supply a transcript".into())
        })?;
        Ok(tokens_to_ipa(&transcriber.transcribe(streams)?, WORD_SEPARATOR))
    }

    /// Run one job to completion
    pub fn run(&self, job: &VideoJob, cancel: &CancelFlag) -> CueResult<JobOutput> {
        let started = Instant::now();
        if !job.duration.is_positive() {
            return Err(CueError::TimingUnavailable(job.duration));
        }

        cancel.check("phonemes")?;
        let ipa = self.phonemes(&job.source)?;
        let syllables = syllabify(&ipa);
        if syllables.is_empty() {
            return Err(CueError::InputMissing(format!("'{}' has no syllables", ipa)));
        }

        cancel.check("cue mapping")?;
        let mappings = self.mapper.map_all(&syllables);
        let unknown_phonemes: Vec<String> = mappings.iter().flat_map(|m| m.unknown.iter().cloned()).collect();

        cancel.check("timing")?;
        let timing = self
            .resolver
            .resolve(&syllables, job.duration, job.alignment.as_ref())?;
        let fallback = match &timing {
            TimingResolution::Aligned(_) => None,
            TimingResolution::Fallback { reason, .. } => Some(reason.clone()),
        };

        cancel.check("synthesis")?;
        let keyframes = build_keyframes(&syllables, &mappings, &timing, self.synthesizer.config().style)?;
        let trajectory = self
            .synthesizer
            .synthesize(&keyframes, &job.faces, self.frame_rate, job.duration)?;

        let written = match &job.output {
            Some(path) => {
                write_atomic(&trajectory, path, cancel)?;
                Some(path.clone())
            }
            None => None,
        };

        info!(
            job = %job.name,
            syllables = syllables.len(),
            frames = trajectory.len(),
            aligned = timing.is_aligned(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job complete"
        );
        Ok(JobOutput {
            name: job.name.clone(),
            syllables: syllables.len(),
            unknown_phonemes,
            fallback,
            trajectory,
            written,
        })
    }
}

/// Sibling temporary path, `.<name>.partial`
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trajectory".into());
    path.with_file_name(format!(".{}.partial", name))
}

/// Write next to `path`, then rename over it. Nothing is left behind on
/// failure or cancellation.
fn write_atomic(trajectory: &Trajectory, path: &Path, cancel: &CancelFlag) -> CueResult<()> {
    let partial = partial_path(path);
    let result = trajectory
        .write_json(&partial)
        .and_then(|_| cancel.check("rename"))
        .and_then(|_| std::fs::rename(&partial, path).map_err(CueError::from));

    if let Err(e) = &result {
        if partial.exists() {
            if let Err(remove) = std::fs::remove_file(&partial) {
                warn!(path = %partial.display(), error = %remove, "could not remove partial output");
            }
        }
        debug!(path = %path.display(), error = %e, "output not written");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cued_core::{HandPosition, HandShape};
    use cued_recognizer::{Landmark, Recognizer, RecognizerConfig, VocabularyBuilder, WeightStore};
    use cued_time::Interval;

    /// Extracted streams from a slowly drifting synthetic face and hand
    fn streams(frames: usize) -> FeatureStreams {
        let landmarks: Vec<LandmarkFrame> = (0..frames + 2)
            .map(|t| {
                let s = t as f32 * 0.003;
                LandmarkFrame {
                    face: (0..468)
                        .map(|i| Landmark::new(0.3 + (i % 30) as f32 * 0.013, 0.2 + (i / 30) as f32 * 0.02 + s, 0.0))
                        .collect(),
                    hand: (0..21)
                        .map(|i| Landmark::new(0.7 - s, 0.5 + i as f32 * 0.012, 0.0))
                        .collect(),
                }
            })
            .collect();
        FeatureExtractor::new().extract_streams(&landmarks).unwrap()
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(&PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_transcript_job() {
        let job = VideoJob::transcript("bonjour", "bɔ̃ ʒuʁ", MediaTime::from_millis(1000));
        let out = pipeline().run(&job, &CancelFlag::new()).unwrap();

        assert_eq!(out.syllables, 2);
        assert_eq!(out.trajectory.len(), 25);
        assert!(out.trajectory.is_contiguous());
        assert_eq!(out.fallback, Some(FallbackReason::NoAlignment));
        assert!(out.unknown_phonemes.is_empty());

        // "bɔ̃" is shape 4 at the mouth, "ʒuʁ" shape 1 at the chin
        let last = out.trajectory.frames().last().unwrap();
        assert_eq!(last.shape, HandShape::One);
        assert_eq!(last.position, HandPosition::Chin);
    }

    #[test]
    fn test_aligned_job() {
        let intervals = vec![
            Interval::new(MediaTime::from_millis(0), MediaTime::from_millis(300), "b a"),
            Interval::new(MediaTime::from_millis(300), MediaTime::from_millis(800), "t o"),
        ];
        let job = VideoJob::transcript("bateau", "ba to", MediaTime::from_millis(800))
            .with_alignment(Alignment::Words(intervals));
        let out = pipeline().run(&job, &CancelFlag::new()).unwrap();
        assert_eq!(out.fallback, None);
        assert_eq!(out.trajectory.len(), 20);
    }

    #[test]
    fn test_phoneme_tokens_with_unknown() {
        let tokens = ["p", "a", "_", "ʘ", "i"]
            .iter()
            .map(|s| PhonemeToken::new(*s, 0.9))
            .collect();
        let job = VideoJob::new("clicks", JobSource::Phonemes(tokens), MediaTime::from_millis(600));
        let out = pipeline().run(&job, &CancelFlag::new()).unwrap();
        assert_eq!(out.unknown_phonemes, vec!["ʘ".to_string()]);
    }

    #[test]
    fn test_fatal_inputs() {
        let p = pipeline();
        let flag = CancelFlag::new();

        let empty = VideoJob::transcript("empty", "   ", MediaTime::from_millis(500));
        assert_eq!(p.run(&empty, &flag).unwrap_err().condition(), "input_missing");

        let zero = VideoJob::transcript("zero", "pa", MediaTime::ZERO);
        assert_eq!(p.run(&zero, &flag).unwrap_err().condition(), "timing_unavailable");

        let features = VideoJob::new("features", JobSource::Features(streams(4)), MediaTime::from_millis(500));
        assert_eq!(p.run(&features, &flag).unwrap_err().condition(), "recognizer_load_failure");
    }

    #[test]
    fn test_features_through_recognizer() {
        let vocab = VocabularyBuilder::new().extend(["p", "a", "t", "i", "_"]).build();
        let config = RecognizerConfig::tiny(vocab.len());
        let store = WeightStore::random(&config, 9);
        let recognizer = Recognizer::from_weights(config, &store).unwrap();
        let transcriber = Transcriber::new(Arc::new(recognizer), Arc::new(vocab)).unwrap();
        let p = pipeline().with_transcriber(transcriber);

        let job = VideoJob::new("features", JobSource::Features(streams(30)), MediaTime::from_millis(1200));
        // Random weights may decode to nothing; either way the stage ran
        match p.run(&job, &CancelFlag::new()) {
            Ok(out) => assert_eq!(out.trajectory.len(), 30),
            Err(e) => assert_eq!(e.condition(), "input_missing"),
        }
    }

    #[test]
    fn test_cancelled_job() {
        let flag = CancelFlag::new();
        flag.cancel();
        let job = VideoJob::transcript("stop", "pa", MediaTime::from_millis(500));
        assert_eq!(pipeline().run(&job, &flag).unwrap_err().condition(), "cancelled");
    }

    #[test]
    fn test_atomic_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pa.json");
        let job = VideoJob::transcript("pa", "pa", MediaTime::from_millis(400)).with_output(&path);

        let out = pipeline().run(&job, &CancelFlag::new()).unwrap();
        assert_eq!(out.written.as_deref(), Some(path.as_path()));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Trajectory::from_json(&text).unwrap(), out.trajectory);
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_cancel_before_rename_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let job = VideoJob::transcript("pa", "pa", MediaTime::from_millis(400));
        let trajectory = pipeline().run(&job, &CancelFlag::new()).unwrap().trajectory;

        let flag = CancelFlag::new();
        flag.cancel();
        let err = write_atomic(&trajectory, &path, &flag).unwrap_err();
        assert_eq!(err.condition(), "cancelled");
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_missing_handshape_dir() {
        let config = PipelineConfig {
            handshapes_dir: Some("/nonexistent/handshapes".into()),
            ..PipelineConfig::default()
        };
        assert!(Pipeline::new(&config).is_err());
    }
}
