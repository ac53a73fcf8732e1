//! Reference utterances
//!
//! French sentences with a hand-checked broad IPA transcription. Clip
//! lengths are derived from the syllable count so every cue has time to
//! form and hold.

use cued_core::MediaTime;
use cued_phonetics::syllabify;
use cued_time::{proportional_spans, Alignment, Interval};

/// Time given to each syllable in a synthetic clip
pub const SYLLABLE_MILLIS: i64 = 300;

/// Share of each aligned interval that is speech; the rest is a pause
pub const SPEECH_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utterance {
    pub text: &'static str,
    pub ipa: &'static str,
}

pub const CORPUS: &[Utterance] = &[
    Utterance {
        text: "bonjour",
        ipa: "bɔ̃ʒuʁ",
    },
    Utterance {
        text: "merci beaucoup",
        ipa: "mɛʁsi boku",
    },
    Utterance {
        text: "le petit chat dort",
        ipa: "lə pəti ʃa dɔʁ",
    },
    Utterance {
        text: "une maison bleue",
        ipa: "yn mɛzɔ̃ blø",
    },
    Utterance {
        text: "il fait beau aujourd'hui",
        ipa: "il fɛ bo oʒuʁdɥi",
    },
    Utterance {
        text: "la langue française parlée complétée",
        ipa: "la lɑ̃ɡ fʁɑ̃sɛz paʁle kɔ̃plete",
    },
    Utterance {
        text: "un chien brun",
        ipa: "œ̃ ʃjɛ̃ bʁœ̃",
    },
    Utterance {
        text: "gagner du pain",
        ipa: "ɡaɲe dy pɛ̃",
    },
];

impl Utterance {
    pub fn syllable_count(&self) -> usize {
        syllabify(self.ipa).len()
    }

    pub fn duration(&self) -> MediaTime {
        MediaTime::from_millis(self.syllable_count().max(1) as i64 * SYLLABLE_MILLIS)
    }

    /// Whitespace-separated IPA words
    pub fn words(&self) -> Vec<&'static str> {
        self.ipa.split_whitespace().collect()
    }

    /// One interval per word, weighted by word length, each followed by
    /// a short pause
    pub fn word_alignment(&self) -> Alignment {
        let words = self.words();
        let weights: Vec<u64> = words.iter().map(|w| w.chars().count() as u64).collect();
        let spans = proportional_spans(MediaTime::ZERO, self.duration(), &weights);
        Alignment::Words(
            spans
                .into_iter()
                .zip(words)
                .map(|((start, end), word)| Interval::new(start, start.lerp(end, SPEECH_RATIO), word))
                .collect(),
        )
    }

    /// One interval per segment, evenly spread over the clip
    pub fn phone_alignment(&self) -> Alignment {
        let segments: Vec<String> = syllabify(self.ipa)
            .iter()
            .flat_map(|s| s.segments().iter().map(|seg| seg.symbol.clone()))
            .collect();
        let weights = vec![1; segments.len()];
        let spans = proportional_spans(MediaTime::ZERO, self.duration(), &weights);
        Alignment::Phones(
            spans
                .into_iter()
                .zip(segments)
                .map(|((start, end), symbol)| Interval::new(start, end, symbol))
                .collect(),
        )
    }
}

/// Every distinct segment symbol in the corpus, in first-seen order
pub fn corpus_phonemes() -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for utterance in CORPUS {
        for syllable in syllabify(utterance.ipa) {
            for segment in syllable.segments() {
                if !seen.contains(&segment.symbol) {
                    seen.push(segment.symbol.clone());
                }
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignments_validate() {
        for utterance in CORPUS {
            let total = utterance.duration();
            assert!(utterance.word_alignment().validate(total).is_ok(), "{}", utterance.text);
            assert!(utterance.phone_alignment().validate(total).is_ok(), "{}", utterance.text);
        }
    }

    #[test]
    fn test_word_alignment_shape() {
        let alignment = CORPUS[1].word_alignment();
        let intervals = alignment.intervals();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].label, "mɛʁsi");
        assert!(intervals[0].end < intervals[1].start);
    }

    #[test]
    fn test_corpus_phonemes_are_unique() {
        let phonemes = corpus_phonemes();
        assert!(phonemes.contains(&"ɔ̃".to_string()));
        assert!(phonemes.contains(&"ɥ".to_string()));
        let mut sorted = phonemes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), phonemes.len());
    }
}
