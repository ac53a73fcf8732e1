//! CUED Time - Phase timing for cue syllables
//!
//! This crate places four phase anchors on every syllable:
//! - a1: the hand starts leaving the previous cue
//! - m1: the hand starts moving toward this cue
//! - m2: this cue is fully formed
//! - a3: the hand starts leaving this cue
//!
//! Syllable spans come from an external alignment when one is supplied and
//! valid, otherwise from a proportional split of the clip duration.

pub mod alignment;
pub mod anchors;
pub mod resolver;

pub use alignment::*;
pub use anchors::*;
pub use resolver::*;
