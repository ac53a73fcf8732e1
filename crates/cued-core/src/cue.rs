//! LPC cue vocabulary
//!
//! French Cued Speech (Langue française Parlée Complétée) pairs one of eight
//! hand shapes (consonant groups) with one of five positions around the face
//! (vowel groups). These are the ids the mapper emits and the synthesizer
//! renders.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hand shape (consonant group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandShape {
    /// p d ʒ
    One,
    /// k v z
    Two,
    /// s ʁ
    Three,
    /// b n ɥ
    Four,
    /// t m f, and the neutral shape for a vowel alone
    Five,
    /// l ʃ ɲ w
    Six,
    /// g
    Seven,
    /// j ŋ
    Eight,
    /// Symbol outside the phoneme inventory
    Unknown,
}

impl HandShape {
    /// Shape used for a syllable without a consonant
    pub const NEUTRAL: HandShape = HandShape::Five;

    /// All renderable shapes in id order
    pub fn all() -> &'static [HandShape] {
        &[
            HandShape::One,
            HandShape::Two,
            HandShape::Three,
            HandShape::Four,
            HandShape::Five,
            HandShape::Six,
            HandShape::Seven,
            HandShape::Eight,
        ]
    }

    /// Numeric id, 1-8 as in the LPC charts; 0 for unknown
    pub fn id(self) -> u8 {
        match self {
            HandShape::One => 1,
            HandShape::Two => 2,
            HandShape::Three => 3,
            HandShape::Four => 4,
            HandShape::Five => 5,
            HandShape::Six => 6,
            HandShape::Seven => 7,
            HandShape::Eight => 8,
            HandShape::Unknown => 0,
        }
    }

    pub fn from_id(id: u8) -> Option<HandShape> {
        match id {
            0 => Some(HandShape::Unknown),
            1..=8 => Some(HandShape::all()[id as usize - 1]),
            _ => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != HandShape::Unknown
    }
}

impl fmt::Display for HandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandShape::Unknown => write!(f, "shape(?)"),
            shape => write!(f, "shape({})", shape.id()),
        }
    }
}

/// Hand position (vowel group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandPosition {
    /// Beside the face: a o œ ə, and a consonant alone
    Side,
    /// Corner of the mouth: i ɔ̃ ɑ̃
    Mouth,
    /// Chin: ɛ u ɔ
    Chin,
    /// Cheekbone: ɛ̃ ø
    Cheek,
    /// Throat: œ̃ y e
    Throat,
    /// Symbol outside the phoneme inventory
    Unknown,
}

impl HandPosition {
    /// Position used for a consonant without a vowel
    pub const NEUTRAL: HandPosition = HandPosition::Side;

    pub fn all() -> &'static [HandPosition] {
        &[
            HandPosition::Side,
            HandPosition::Mouth,
            HandPosition::Chin,
            HandPosition::Cheek,
            HandPosition::Throat,
        ]
    }

    /// Numeric id, 1-5; 0 for unknown
    pub fn id(self) -> u8 {
        match self {
            HandPosition::Side => 1,
            HandPosition::Mouth => 2,
            HandPosition::Chin => 3,
            HandPosition::Cheek => 4,
            HandPosition::Throat => 5,
            HandPosition::Unknown => 0,
        }
    }

    pub fn is_known(self) -> bool {
        self != HandPosition::Unknown
    }
}

impl fmt::Display for HandPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandPosition::Side => "side",
            HandPosition::Mouth => "mouth",
            HandPosition::Chin => "chin",
            HandPosition::Cheek => "cheek",
            HandPosition::Throat => "throat",
            HandPosition::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// A complete cue: what the hand looks like and where it goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CueTarget {
    pub shape: HandShape,
    pub position: HandPosition,
}

impl CueTarget {
    pub fn new(shape: HandShape, position: HandPosition) -> Self {
        Self { shape, position }
    }

    /// Cue emitted for input the mapper cannot interpret
    pub fn unknown() -> Self {
        Self::new(HandShape::Unknown, HandPosition::Unknown)
    }

    pub fn is_known(&self) -> bool {
        self.shape.is_known() && self.position.is_known()
    }
}
