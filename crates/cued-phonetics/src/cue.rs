//! Cue Mapper - syllable to LPC hand shape and position
//!
//! The consonant spoken together with the vowel selects the hand shape, the
//! vowel selects the position. A vowel alone uses the neutral shape, a
//! consonant alone is cued at the side position.

use std::collections::HashMap;

use cued_core::{CueError, CueTarget, HandPosition, HandShape};
use tracing::warn;

use crate::{is_modifier, PhonemeClass, Segment, SyllableUnit};

/// Consonant groups per hand shape
const SHAPE_TABLE: &[(HandShape, &[&str])] = &[
    (HandShape::One, &["p", "d", "ʒ"]),
    (HandShape::Two, &["k", "v", "z"]),
    (HandShape::Three, &["s", "ʁ", "r", "ʀ"]),
    (HandShape::Four, &["b", "n", "ɥ"]),
    (HandShape::Five, &["t", "m", "f"]),
    (HandShape::Six, &["l", "ʃ", "ɲ", "w"]),
    (HandShape::Seven, &["g", "ɡ"]),
    (HandShape::Eight, &["j", "ŋ"]),
];

/// Vowel groups per hand position
const POSITION_TABLE: &[(HandPosition, &[&str])] = &[
    (HandPosition::Side, &["a", "o", "œ", "ə", "ɑ"]),
    (HandPosition::Mouth, &["i", "ɔ̃", "ɑ̃"]),
    (HandPosition::Chin, &["ɛ", "u", "ɔ"]),
    (HandPosition::Cheek, &["ɛ̃", "ø"]),
    (HandPosition::Throat, &["œ̃", "y", "e"]),
];

/// Result of mapping one syllable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueMapping {
    /// The cue to perform
    pub target: CueTarget,
    /// Symbols of the syllable that are outside the inventory
    pub unknown: Vec<String>,
}

impl CueMapping {
    pub fn has_unknown(&self) -> bool {
        !self.unknown.is_empty()
    }
}

/// Table-driven LPC cue mapper
#[derive(Debug, Clone)]
pub struct CueMapper {
    shapes: HashMap<&'static str, HandShape>,
    positions: HashMap<&'static str, HandPosition>,
}

impl Default for CueMapper {
    fn default() -> Self {
        Self::lpc()
    }
}

impl CueMapper {
    /// Mapper for the French LPC code
    pub fn lpc() -> Self {
        let shapes = SHAPE_TABLE
            .iter()
            .flat_map(|(shape, symbols)| symbols.iter().map(move |s| (*s, *shape)))
            .collect();
        let positions = POSITION_TABLE
            .iter()
            .flat_map(|(pos, symbols)| symbols.iter().map(move |s| (*s, *pos)))
            .collect();

        Self { shapes, positions }
    }

    /// Hand shape for a consonant or glide symbol
    pub fn shape_of(&self, symbol: &str) -> Option<HandShape> {
        // Whole symbol first, then compose from its characters; the part
        // nearest the vowel (the last one) decides.
        self.shapes
            .get(symbol)
            .copied()
            .or_else(|| decompose(symbol).rev().find_map(|c| self.shapes.get(c).copied()))
    }

    /// Hand position for a vowel symbol
    pub fn position_of(&self, symbol: &str) -> Option<HandPosition> {
        self.positions
            .get(symbol)
            .copied()
            .or_else(|| longest_prefix(symbol, |s| self.positions.get(s).copied()))
    }

    /// Map a syllable to its cue
    pub fn map(&self, syllable: &SyllableUnit) -> CueMapping {
        let segments = syllable.segments();
        let vowel_idx = segments.iter().position(|s| s.class == PhonemeClass::Vowel);

        let mut unknown: Vec<String> = segments
            .iter()
            .filter(|s| s.class == PhonemeClass::Other)
            .map(|s| s.symbol.clone())
            .collect();

        let target = match vowel_idx {
            Some(v) => {
                let position = self.position_of(&segments[v].symbol);
                let shape = match v.checked_sub(1).map(|k| &segments[k]) {
                    // Glide directly before the vowel, or the last onset consonant
                    Some(key) => self.shape_of(&key.symbol),
                    None => Some(HandShape::NEUTRAL),
                };
                if position.is_none() {
                    push_unique(&mut unknown, &segments[v].symbol);
                }
                CueTarget::new(
                    shape.unwrap_or(HandShape::Unknown),
                    position.unwrap_or(HandPosition::Unknown),
                )
            }
            None => {
                // Consonant (or glide) alone, cued at the side
                let shape = lone_consonant(segments).and_then(|key| self.shape_of(&key.symbol));
                CueTarget::new(
                    shape.unwrap_or(HandShape::Unknown),
                    if shape.is_some() {
                        HandPosition::NEUTRAL
                    } else {
                        HandPosition::Unknown
                    },
                )
            }
        };

        for symbol in &unknown {
            let err = CueError::UnknownPhoneme(symbol.clone());
            warn!(syllable = %syllable.text, %err, "mapping to unknown cue component");
        }

        CueMapping { target, unknown }
    }

    /// Map every syllable in order
    pub fn map_all(&self, syllables: &[SyllableUnit]) -> Vec<CueMapping> {
        syllables.iter().map(|s| self.map(s)).collect()
    }
}

fn lone_consonant(segments: &[Segment]) -> Option<&Segment> {
    segments
        .iter()
        .rev()
        .find(|s| matches!(s.class, PhonemeClass::Consonant | PhonemeClass::Glide))
        .or_else(|| segments.last())
}

fn push_unique(list: &mut Vec<String>, symbol: &str) {
    if !list.iter().any(|s| s == symbol) {
        list.push(symbol.to_string());
    }
}

/// Base characters of a symbol as standalone strings, modifiers dropped
fn decompose(symbol: &str) -> impl DoubleEndedIterator<Item = &str> {
    symbol
        .char_indices()
        .filter(|(_, c)| !is_modifier(*c))
        .map(move |(i, c)| &symbol[i..i + c.len_utf8()])
}

/// Longest leading run of `symbol` (by characters) the lookup accepts;
/// falls back to the first base character.
fn longest_prefix<T>(symbol: &str, lookup: impl Fn(&str) -> Option<T>) -> Option<T> {
    let ends: Vec<usize> = symbol
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .collect();
    ends.iter()
        .rev()
        .find_map(|&end| lookup(&symbol[..end]))
        .or_else(|| decompose(symbol).find_map(|c| lookup(c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syllabify;

    fn cue(ipa: &str) -> CueTarget {
        let units = syllabify(ipa);
        assert_eq!(units.len(), 1, "expected a single syllable for {ipa}");
        CueMapper::lpc().map(&units[0]).target
    }

    #[test]
    fn test_consonant_vowel() {
        assert_eq!(cue("pa"), CueTarget::new(HandShape::One, HandPosition::Side));
        assert_eq!(cue("ki"), CueTarget::new(HandShape::Two, HandPosition::Mouth));
        assert_eq!(cue("su"), CueTarget::new(HandShape::Three, HandPosition::Chin));
        assert_eq!(cue("bø"), CueTarget::new(HandShape::Four, HandPosition::Cheek));
        assert_eq!(cue("ty"), CueTarget::new(HandShape::Five, HandPosition::Throat));
        assert_eq!(cue("lɑ̃"), CueTarget::new(HandShape::Six, HandPosition::Mouth));
        assert_eq!(cue("gɛ̃"), CueTarget::new(HandShape::Seven, HandPosition::Cheek));
        assert_eq!(cue("ɲe"), CueTarget::new(HandShape::Six, HandPosition::Throat));
    }

    #[test]
    fn test_vowel_alone_uses_neutral_shape() {
        assert_eq!(cue("a"), CueTarget::new(HandShape::NEUTRAL, HandPosition::Side));
        assert_eq!(cue("ɔ̃"), CueTarget::new(HandShape::NEUTRAL, HandPosition::Mouth));
    }

    #[test]
    fn test_consonant_adjacent_to_vowel_wins() {
        // "tʁə": ʁ is spoken with the vowel
        let units = syllabify("tʁə");
        let mapping = CueMapper::lpc().map(&units[0]);
        assert_eq!(mapping.target, CueTarget::new(HandShape::Three, HandPosition::Side));
    }

    #[test]
    fn test_glide_before_vowel_selects_shape() {
        assert_eq!(cue("wa"), CueTarget::new(HandShape::Six, HandPosition::Side));
        assert_eq!(cue("pwa"), CueTarget::new(HandShape::Six, HandPosition::Side));
        assert_eq!(cue("ɥi"), CueTarget::new(HandShape::Four, HandPosition::Mouth));
    }

    #[test]
    fn test_consonant_alone_at_side() {
        let units = syllabify("ʃ");
        let mapping = CueMapper::lpc().map(&units[0]);
        assert_eq!(mapping.target, CueTarget::new(HandShape::Six, HandPosition::Side));
    }

    #[test]
    fn test_decomposition_fallback() {
        let mapper = CueMapper::lpc();
        assert_eq!(mapper.shape_of("dʒ"), Some(HandShape::One));
        assert_eq!(mapper.shape_of("tʃ"), Some(HandShape::Six));
        assert_eq!(mapper.position_of("aː"), Some(HandPosition::Side));
        assert_eq!(mapper.position_of("ɑ̃"), Some(HandPosition::Mouth));
    }

    #[test]
    fn test_unknown_symbol_does_not_abort() {
        let units = syllabify("§a");
        let mapping = CueMapper::lpc().map(&units[0]);
        assert_eq!(mapping.target.shape, HandShape::Unknown);
        assert_eq!(mapping.target.position, HandPosition::Side);
        assert_eq!(mapping.unknown, vec!["§".to_string()]);
    }

    #[test]
    fn test_unknown_only_unit() {
        let units = syllabify("42");
        let mapping = CueMapper::lpc().map(&units[0]);
        assert_eq!(mapping.target, CueTarget::unknown());
        assert!(mapping.has_unknown());
    }

    #[test]
    fn test_map_all_is_one_to_one() {
        let units = syllabify("məʁki a toys");
        let mappings = CueMapper::lpc().map_all(&units);
        assert_eq!(mappings.len(), units.len());
        assert!(mappings.iter().all(|m| m.target.is_known()));
    }
}
