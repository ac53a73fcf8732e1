//! French phoneme inventory and IPA segmentation

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Oral and nasal vowels
pub const VOWELS: &[&str] = &[
    "a", "e", "i", "o", "u", "y", "ɛ", "ɔ", "ø", "œ", "ə", "ɑ", "ɑ̃", "ɛ̃", "ɔ̃", "œ̃",
];

/// Semi-vowels; they can sit in a nucleus but cue like consonants
pub const GLIDES: &[&str] = &["j", "w", "ɥ"];

/// Consonants, including common transcription variants (ɡ/g, r/ʁ/ʀ)
pub const CONSONANTS: &[&str] = &[
    "p", "b", "t", "d", "k", "g", "ɡ", "f", "v", "s", "z", "ʃ", "ʒ", "m", "n", "ɲ", "ŋ", "l",
    "ʁ", "r", "ʀ",
];

/// Broad phoneme class of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhonemeClass {
    Vowel,
    Glide,
    Consonant,
    /// Outside the inventory (punctuation, digits, foreign symbols)
    Other,
}

impl PhonemeClass {
    /// Classify a symbol, falling back to its base character
    pub fn of(symbol: &str) -> PhonemeClass {
        if let Some(class) = Self::exact(symbol) {
            return class;
        }
        symbol
            .chars()
            .find(|c| !is_modifier(*c))
            .and_then(|base| {
                let mut buf = [0u8; 4];
                Self::exact(base.encode_utf8(&mut buf))
            })
            .unwrap_or(PhonemeClass::Other)
    }

    fn exact(symbol: &str) -> Option<PhonemeClass> {
        if VOWELS.contains(&symbol) {
            Some(PhonemeClass::Vowel)
        } else if GLIDES.contains(&symbol) {
            Some(PhonemeClass::Glide)
        } else if CONSONANTS.contains(&symbol) {
            Some(PhonemeClass::Consonant)
        } else {
            None
        }
    }

    /// Can this class carry a syllable nucleus?
    #[inline]
    pub fn is_nucleus(self) -> bool {
        matches!(self, PhonemeClass::Vowel | PhonemeClass::Glide)
    }
}

/// Combining diacritics and length/aspiration modifiers attach to the
/// preceding base character.
#[inline]
pub fn is_modifier(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}' | 'ː' | 'ˑ' | 'ʰ')
}

/// One IPA grapheme within a word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Grapheme text (base + modifiers)
    pub symbol: String,
    /// Phoneme class
    pub class: PhonemeClass,
    /// Byte range within the word it was cut from
    pub range: Range<usize>,
}

impl Segment {
    #[inline]
    pub fn is_nucleus(&self) -> bool {
        self.class.is_nucleus()
    }
}

/// Cut a word into graphemes. Every byte of the word lands in exactly one
/// segment.
pub fn segment_word(word: &str) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();

    for (idx, c) in word.char_indices() {
        let end = idx + c.len_utf8();
        match segments.last_mut() {
            Some(last) if is_modifier(c) => {
                last.symbol.push(c);
                last.range.end = end;
            }
            _ => segments.push(Segment {
                symbol: c.to_string(),
                class: PhonemeClass::Other,
                range: idx..end,
            }),
        }
    }

    for segment in &mut segments {
        segment.class = PhonemeClass::of(&segment.symbol);
    }

    segments
}
