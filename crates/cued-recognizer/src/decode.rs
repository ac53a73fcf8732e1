//! Greedy CTC decoding
//!
//! Frame-wise argmax, collapse repeats, drop blanks. Each emitted token
//! carries the softmax probability of the frame that produced it.

use std::path::Path;
use std::sync::Arc;

use cued_core::{CueError, CueResult, PhonemeToken};
use ndarray::ArrayView1;
use tracing::debug;

use crate::{FeatureStreams, Logits, Recognizer, RecognizerConfig, VocabularyTable};

/// Word boundary symbol in the recognizer vocabulary
pub const WORD_SEPARATOR: &str = "_";

/// Options for CTC decoding
#[derive(Debug, Clone)]
pub struct CtcOptions {
    /// Blank token id
    pub blank_id: u32,
    /// Merge consecutive identical tokens (standard CTC behaviour)
    pub merge_repeated: bool,
    /// Tokens whose log probability falls below this are dropped
    pub log_prob_threshold: f32,
}

impl Default for CtcOptions {
    fn default() -> Self {
        Self {
            blank_id: VocabularyTable::BLANK_ID,
            merge_repeated: true,
            log_prob_threshold: f32::NEG_INFINITY,
        }
    }
}

/// Collapsed token ids with the frame each came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CtcResult {
    pub tokens: Vec<u32>,
    pub alignments: Vec<usize>,
    pub confidences: Vec<f32>,
}

impl CtcResult {
    pub fn average_confidence(&self) -> f32 {
        if self.confidences.is_empty() {
            0.0
        } else {
            self.confidences.iter().sum::<f32>() / self.confidences.len() as f32
        }
    }
}

/// Best class and its softmax probability
fn best_class(frame: ArrayView1<'_, f32>) -> (u32, f32) {
    let (best, max) = frame
        .iter()
        .enumerate()
        .fold((0usize, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        });
    let denom: f32 = frame.iter().map(|v| (v - max).exp()).sum();
    (best as u32, 1.0 / denom)
}

#[derive(Debug, Clone, Default)]
pub struct GreedyCtcDecoder {
    options: CtcOptions,
}

impl GreedyCtcDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CtcOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CtcOptions {
        &self.options
    }

    pub fn decode(&self, logits: &Logits) -> CtcResult {
        let mut result = CtcResult::default();
        let mut prev: Option<u32> = None;

        for t in 0..logits.frames() {
            let (token, confidence) = best_class(logits.frame(t));

            if token == self.options.blank_id {
                prev = Some(token);
                continue;
            }
            if self.options.merge_repeated && prev == Some(token) {
                continue;
            }
            prev = Some(token);
            if confidence.ln() < self.options.log_prob_threshold {
                continue;
            }

            result.tokens.push(token);
            result.alignments.push(t);
            result.confidences.push(confidence);
        }
        result
    }

    /// Decode into phoneme tokens.
    ///
    /// Special tokens are dropped. Word separators survive only between
    /// phonemes, never doubled, leading or trailing.
    pub fn decode_phonemes(&self, logits: &Logits, vocab: &VocabularyTable) -> Vec<PhonemeToken> {
        let ctc = self.decode(logits);
        let mut tokens: Vec<PhonemeToken> = Vec::with_capacity(ctc.tokens.len());

        for (&id, &confidence) in ctc.tokens.iter().zip(&ctc.confidences) {
            if vocab.is_special(id) {
                continue;
            }
            let Some(symbol) = vocab.symbol(id) else {
                continue;
            };
            if symbol == WORD_SEPARATOR
                && tokens.last().map_or(true, |last| last.symbol == WORD_SEPARATOR)
            {
                continue;
            }
            tokens.push(PhonemeToken::new(symbol, confidence));
        }
        while tokens.last().is_some_and(|t| t.symbol == WORD_SEPARATOR) {
            tokens.pop();
        }
        tokens
    }
}

/// Recognizer, vocabulary and decoder bundled for the runtime
#[derive(Debug, Clone)]
pub struct Transcriber {
    recognizer: Arc<Recognizer>,
    vocab: Arc<VocabularyTable>,
    decoder: GreedyCtcDecoder,
}

impl Transcriber {
    pub fn new(recognizer: Arc<Recognizer>, vocab: Arc<VocabularyTable>) -> CueResult<Self> {
        let classes = recognizer.config().vocab_size;
        if vocab.len() != classes {
            return Err(CueError::RecognizerLoadFailure(format!(
                "vocabulary has {} symbols, recognizer emits {} classes",
                vocab.len(),
                classes
            )));
        }
        Ok(Self {
            recognizer,
            vocab,
            decoder: GreedyCtcDecoder::new(),
        })
    }

    /// Load the vocabulary CSV, then weights sized to it
    pub fn load(
        weights: impl AsRef<Path>,
        vocabulary: impl AsRef<Path>,
        hidden_size: usize,
        num_layers: usize,
    ) -> CueResult<Self> {
        let vocab = VocabularyTable::from_csv_path(vocabulary)?;
        let config = RecognizerConfig {
            hidden_size,
            num_layers,
            ..RecognizerConfig::new(vocab.len())
        };
        let recognizer = Recognizer::load(config, weights)?;
        Self::new(Arc::new(recognizer), Arc::new(vocab))
    }

    pub fn with_decoder(mut self, decoder: GreedyCtcDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn recognizer(&self) -> &Arc<Recognizer> {
        &self.recognizer
    }

    pub fn vocabulary(&self) -> &VocabularyTable {
        &self.vocab
    }

    pub fn transcribe(&self, streams: &FeatureStreams) -> CueResult<Vec<PhonemeToken>> {
        let logits = self.recognizer.infer(streams)?;
        let tokens = self.decoder.decode_phonemes(&logits, &self.vocab);
        debug!(frames = streams.len(), tokens = tokens.len(), "transcribed clip");
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VocabularyBuilder, WeightStore};
    use ndarray::Array2;

    /// One-hot-ish logits picking `ids` frame by frame
    fn logits(ids: &[usize], classes: usize) -> Logits {
        Logits::new(Array2::from_shape_fn((ids.len(), classes), |(t, c)| {
            if c == ids[t] {
                5.0
            } else {
                0.0
            }
        }))
    }

    fn vocab() -> VocabularyTable {
        // a=5 b=6 _=7
        VocabularyBuilder::new().extend(["a", "b", "_"]).build()
    }

    #[test]
    fn test_collapse_and_blanks() {
        let result = GreedyCtcDecoder::new().decode(&logits(&[5, 5, 0, 5, 6, 6, 0], 8));
        assert_eq!(result.tokens, vec![5, 5, 6]);
        assert_eq!(result.alignments, vec![0, 3, 4]);

        let expected = 5f32.exp() / (5f32.exp() + 7.0);
        assert!((result.average_confidence() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_no_merge() {
        let decoder = GreedyCtcDecoder::with_options(CtcOptions {
            merge_repeated: false,
            ..CtcOptions::default()
        });
        assert_eq!(decoder.decode(&logits(&[5, 5, 6], 8)).tokens, vec![5, 5, 6]);
    }

    #[test]
    fn test_threshold_drops_unsure() {
        let decoder = GreedyCtcDecoder::with_options(CtcOptions {
            log_prob_threshold: -0.01,
            ..CtcOptions::default()
        });
        assert!(decoder.decode(&logits(&[5, 6], 8)).tokens.is_empty());
    }

    #[test]
    fn test_phonemes_with_separators() {
        let tokens = GreedyCtcDecoder::new()
            .decode_phonemes(&logits(&[7, 5, 0, 7, 7, 0, 7, 6, 1, 7], 8), &vocab());
        let symbols: Vec<&str> = tokens.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["a", "_", "b"]);
        assert!(tokens.iter().all(|t| t.confidence > 0.5));
    }

    #[test]
    fn test_transcriber_vocab_must_match() {
        let config = RecognizerConfig::tiny(9);
        let store = WeightStore::random(&config, 2);
        let recognizer = Arc::new(Recognizer::from_weights(config, &store).unwrap());

        let err = Transcriber::new(Arc::clone(&recognizer), Arc::new(vocab())).unwrap_err();
        assert_eq!(err.condition(), "recognizer_load_failure");

        let vocab = VocabularyBuilder::new().extend(["a", "b", "_", "t"]).build();
        let transcriber = Transcriber::new(recognizer, Arc::new(vocab)).unwrap();
        let streams = FeatureStreams::new(Array2::ones((5, 7)), Array2::ones((5, 18)), Array2::ones((5, 8)))
            .unwrap();
        let tokens = transcriber.transcribe(&streams).unwrap();
        assert!(tokens.len() <= 5);
        assert!(tokens.first().map_or(true, |t| t.symbol != WORD_SEPARATOR));
    }
}
