//! CUED Phonetics - from IPA text to LPC cues
//!
//! Two leaf stages of the cue pipeline live here:
//!
//! - The syllabifier splits an IPA string into syllable units by a fixed
//!   phonotactic rule set. It is pure and deterministic.
//! - The cue mapper turns each syllable into a hand shape and a hand
//!   position using the French LPC code table.
//!
//! Both operate on [`Segment`]s: one IPA grapheme each, so a nasal vowel
//! such as `ɑ̃` (base + combining tilde) is a single vowel, never a vowel
//! followed by an unknown mark.

pub mod cue;
pub mod inventory;
pub mod syllable;

pub use cue::*;
pub use inventory::*;
pub use syllable::*;
