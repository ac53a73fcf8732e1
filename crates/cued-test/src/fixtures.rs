//! Synthetic inputs
//!
//! Stand-ins for the vision and training collaborators: mesh-sized face
//! and hand landmarks, face tracks with dropped detections, and a
//! randomly initialised recognizer written to disk.

use std::path::Path;

use cued_core::{CueError, CueResult};
use cued_recognizer::{Landmark, LandmarkFrame, Precision, RecognizerConfig, VocabularyBuilder, WeightStore};
use cued_runtime::RecognizerFiles;
use cued_visual::{FaceBox, FaceFrame, FaceTrack};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::corpus::corpus_phonemes;

/// Face mesh size expected by the feature extractor
pub const FACE_MESH_POINTS: usize = 468;
/// Hand landmarks per frame
pub const HAND_POINTS: usize = 21;

/// Landmark stream generator
#[derive(Debug, Clone)]
pub struct SyntheticLandmarks {
    /// Per-coordinate noise amplitude
    pub jitter: f32,
    /// Probability a frame loses its hand
    pub hand_dropout: f64,
    pub seed: u64,
}

impl Default for SyntheticLandmarks {
    fn default() -> Self {
        Self {
            jitter: 0.002,
            hand_dropout: 0.0,
            seed: 7,
        }
    }
}

impl SyntheticLandmarks {
    /// Face mesh on a grid with the hand circling beside it
    pub fn generate(&self, frames: usize) -> Vec<LandmarkFrame> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..frames)
            .map(|t| {
                let phase = t as f32 * 0.15;
                let face = (0..FACE_MESH_POINTS)
                    .map(|i| {
                        let x = 0.3 + (i % 30) as f32 * 0.013;
                        let y = 0.2 + (i / 30) as f32 * 0.02 + 0.004 * phase.sin();
                        Landmark::new(x + self.noise(&mut rng), y + self.noise(&mut rng), 0.0)
                    })
                    .collect();
                let hand = if rng.gen_bool(self.hand_dropout) {
                    Vec::new()
                } else {
                    let (cx, cy) = (0.7 + 0.05 * phase.cos(), 0.55 + 0.05 * phase.sin());
                    (0..HAND_POINTS)
                        .map(|i| {
                            let finger = (i.max(1) - 1) / 4;
                            let joint = (i.max(1) - 1) % 4;
                            Landmark::new(
                                cx + finger as f32 * 0.01 + self.noise(&mut rng),
                                cy - joint as f32 * 0.012 + self.noise(&mut rng),
                                -0.01 * joint as f32,
                            )
                        })
                        .collect()
                };
                LandmarkFrame { face, hand }
            })
            .collect()
    }

    fn noise(&self, rng: &mut StdRng) -> f32 {
        if self.jitter > 0.0 {
            rng.gen_range(-self.jitter..self.jitter)
        } else {
            0.0
        }
    }
}

/// Face track drifting slowly, with detections dropped at `dropout`
pub fn face_track(frames: usize, dropout: f64, seed: u64) -> FaceTrack {
    let mut rng = StdRng::seed_from_u64(seed);
    let detections = (0..frames)
        .map(|t| {
            if rng.gen_bool(dropout) {
                None
            } else {
                let drift = (t as f32 * 0.05).sin() * 0.01;
                Some(FaceFrame::from_box(FaceBox::new(0.4 + drift, 0.2, 0.2, 0.3)))
            }
        })
        .collect();
    FaceTrack::new(detections)
}

/// Recognizer sized for quick tests
pub fn tiny_recognizer_files(dir: &Path, seed: u64) -> CueResult<RecognizerFiles> {
    write_recognizer(dir, 8, 1, seed)
}

/// Write a corpus vocabulary and random weights under `dir`
pub fn write_recognizer(
    dir: &Path,
    hidden_size: usize,
    num_layers: usize,
    seed: u64,
) -> CueResult<RecognizerFiles> {
    let phonemes = corpus_phonemes();
    let vocabulary = dir.join("phonelist.csv");
    let mut writer = csv::Writer::from_path(&vocabulary)
        .map_err(|e| CueError::Serialization(format!("{}: {}", vocabulary.display(), e)))?;
    writer
        .write_record(["phoneme"])
        .map_err(|e| CueError::Serialization(e.to_string()))?;
    for phoneme in &phonemes {
        writer
            .write_record([phoneme.as_str()])
            .map_err(|e| CueError::Serialization(e.to_string()))?;
    }
    writer.flush()?;

    let vocab_size = VocabularyBuilder::new().extend(&phonemes).build().len();
    let config = RecognizerConfig {
        hidden_size,
        num_layers,
        ..RecognizerConfig::new(vocab_size)
    };
    let weights = dir.join("model.safetensors");
    WeightStore::random(&config, seed).save(&weights, Precision::F32)?;

    Ok(RecognizerFiles {
        weights,
        vocabulary,
        hidden_size,
        num_layers,
    })
}
