//! Syllabifier - IPA string to syllable units
//!
//! Rules, applied per whitespace-separated word, scanning left to right:
//!
//! - A vowel or glide followed by two consonants closes the syllable after
//!   the first consonant, provided another vowel or glide follows later in
//!   the word (`VC|C...V`). In longer clusters the remaining consonants all
//!   go to the next onset.
//! - Every other position continues the current syllable; a single
//!   consonant between two vowels does not open a boundary.
//! - Consonants before the first vowel form the first onset, consonants
//!   after the last vowel form the final coda.
//! - A word without any vowel or glide becomes one non-syllabic unit.
//!
//! Concatenating the text of all units yields the input with its
//! whitespace removed.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{segment_word, Segment};

/// Shape of a syllable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyllableKind {
    /// Ends in its nucleus
    Open,
    /// Ends in a coda consonant
    Closed,
    /// Consonants only (malformed or interjection input)
    NonSyllabic,
}

/// One syllable of an IPA string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyllableUnit {
    /// Source substring
    pub text: String,
    /// Byte range of `text` in the source string
    pub span: Range<usize>,
    /// Index of the source word
    pub word_index: usize,
    /// Kind of unit
    pub kind: SyllableKind,
    segments: Vec<Segment>,
    onset_len: usize,
    nucleus_len: usize,
}

impl SyllableUnit {
    fn from_segments(word: &str, word_offset: usize, word_index: usize, segments: Vec<Segment>) -> Self {
        let first = segments.iter().position(Segment::is_nucleus);
        let last = segments.iter().rposition(Segment::is_nucleus);

        let (onset_len, nucleus_len, kind) = match (first, last) {
            (Some(first), Some(last)) => {
                let kind = if last + 1 == segments.len() {
                    SyllableKind::Open
                } else {
                    SyllableKind::Closed
                };
                (first, last - first + 1, kind)
            }
            _ => (segments.len(), 0, SyllableKind::NonSyllabic),
        };

        let start = segments.first().map(|s| s.range.start).unwrap_or(0);
        let end = segments.last().map(|s| s.range.end).unwrap_or(0);

        Self {
            text: word[start..end].to_string(),
            span: word_offset + start..word_offset + end,
            word_index,
            kind,
            segments,
            onset_len,
            nucleus_len,
        }
    }

    /// All segments in order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Consonants before the nucleus
    pub fn onset(&self) -> &[Segment] {
        &self.segments[..self.onset_len]
    }

    /// From the first to the last vowel or glide
    pub fn nucleus(&self) -> &[Segment] {
        &self.segments[self.onset_len..self.onset_len + self.nucleus_len]
    }

    /// Consonants after the nucleus
    pub fn coda(&self) -> &[Segment] {
        &self.segments[self.onset_len + self.nucleus_len..]
    }

    /// Length in characters, the weight used by proportional timing
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_syllabic(&self) -> bool {
        self.kind != SyllableKind::NonSyllabic
    }
}

/// Split an IPA string into syllable units
pub fn syllabify(ipa: &str) -> Vec<SyllableUnit> {
    let mut units = Vec::new();

    for (word_index, (offset, word)) in words(ipa).enumerate() {
        let segments = segment_word(word);
        for range in boundaries(&segments) {
            units.push(SyllableUnit::from_segments(
                word,
                offset,
                word_index,
                segments[range].to_vec(),
            ));
        }
    }

    units
}

/// Syllable texts only
pub fn syllable_texts(ipa: &str) -> Vec<String> {
    syllabify(ipa).into_iter().map(|s| s.text).collect()
}

fn words(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let base = text.as_ptr() as usize;
    text.split_whitespace()
        .map(move |word| (word.as_ptr() as usize - base, word))
}

/// Segment ranges of each syllable within one word
fn boundaries(segments: &[Segment]) -> Vec<Range<usize>> {
    let n = segments.len();
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < n {
        let closes = segments[i].is_nucleus()
            && i + 2 < n
            && !segments[i + 1].is_nucleus()
            && !segments[i + 2].is_nucleus()
            && segments[i + 3..].iter().any(Segment::is_nucleus);

        if closes {
            ranges.push(start..i + 2);
            start = i + 2;
            i += 2;
        } else {
            i += 1;
        }
    }

    if start < n {
        ranges.push(start..n);
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const REFERENCE: &str =
        "məʁki a toys poyʁ votʁə attɑ̃tiɔ̃ vos kəstiɔ̃s sɔ̃t ləs biɑ̃vɑ̃yəs";

    #[test]
    fn test_reference_sentence() {
        let expected = vec![
            "məʁ", "ki", "a", "toys", "poyʁ", "vot", "ʁə", "at", "tɑ̃tiɔ̃", "vos", "kəs", "tiɔ̃s",
            "sɔ̃t", "ləs", "biɑ̃vɑ̃yəs",
        ];
        assert_eq!(syllable_texts(REFERENCE), expected);
    }

    #[test]
    fn test_deterministic() {
        let first = syllabify(REFERENCE);
        for _ in 0..10 {
            assert_eq!(syllabify(REFERENCE), first);
        }
    }

    #[test]
    fn test_structure() {
        let units = syllabify("məʁki");
        assert_eq!(units.len(), 2);

        let mer = &units[0];
        assert_eq!(mer.kind, SyllableKind::Closed);
        assert_eq!(mer.onset()[0].symbol, "m");
        assert_eq!(mer.nucleus()[0].symbol, "ə");
        assert_eq!(mer.coda()[0].symbol, "ʁ");

        let ki = &units[1];
        assert_eq!(ki.kind, SyllableKind::Open);
        assert!(ki.coda().is_empty());
    }

    #[test]
    fn test_vowel_only_word() {
        let units = syllabify("a");
        assert_eq!(units.len(), 1);
        assert!(units[0].onset().is_empty());
        assert_eq!(units[0].kind, SyllableKind::Open);
    }

    #[test]
    fn test_consonant_only_word_is_non_syllabic() {
        let units = syllabify("pst a");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "pst");
        assert_eq!(units[0].kind, SyllableKind::NonSyllabic);
        assert!(units[0].nucleus().is_empty());
        assert_eq!(units[0].onset().len(), 3);
        assert!(units[1].is_syllabic());
    }

    #[test]
    fn test_trailing_cluster_attaches_as_coda() {
        let units = syllabify("akst");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].coda().len(), 3);
    }

    #[test]
    fn test_long_cluster_prefers_long_onset() {
        assert_eq!(syllable_texts("akstʁa"), vec!["ak", "stʁa"]);
    }

    #[test]
    fn test_spans_index_source() {
        let units = syllabify(REFERENCE);
        for unit in &units {
            assert_eq!(&REFERENCE[unit.span.clone()], unit.text);
        }
        for pair in units.windows(2) {
            assert!(pair[0].span.end <= pair[1].span.start);
        }
        assert_eq!(units.last().unwrap().word_index, 10);
    }

    #[test]
    fn test_empty_input() {
        assert!(syllabify("").is_empty());
        assert!(syllabify("   ").is_empty());
    }

    proptest! {
        #[test]
        fn prop_reconstructs_source(words in proptest::collection::vec("[aeiouyəɛɔøœptkbdgmnlsʁʃʒfvzjwɥ]{1,8}", 0..8)) {
            let ipa = words.join(" ");
            let rebuilt: String = syllabify(&ipa).into_iter().map(|s| s.text).collect();
            let expected: String = ipa.split_whitespace().collect();
            prop_assert_eq!(rebuilt, expected);
        }

        #[test]
        fn prop_every_syllabic_unit_has_one_nucleus_run(word in "[aeiouptkslʁ]{1,10}") {
            for unit in syllabify(&word) {
                match unit.kind {
                    SyllableKind::NonSyllabic => prop_assert!(unit.nucleus().is_empty()),
                    _ => prop_assert!(unit.nucleus().first().map(Segment::is_nucleus).unwrap_or(false)),
                }
            }
        }
    }
}
