//! Cue keyframes - one fully formed cue per syllable

use cued_core::{CueError, CueResult, CueTarget, HandPosition, HandShape, MediaTime, SyllableIndex};
use cued_phonetics::{CueMapping, SyllableUnit};
use cued_time::{TimingAnchors, TimingResolution};
use serde::{Deserialize, Serialize};

use crate::Easing;

/// How the hand moves between two cues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionStyle {
    #[serde(alias = "easing_function")]
    pub easing: Easing,
    /// Blend landmarks between shapes instead of cutting
    #[serde(alias = "enable_morphing")]
    pub morphing: bool,
    /// Fade the hand through the transition
    #[serde(alias = "enable_transparency")]
    pub transparency: bool,
    /// Move along a curve instead of a straight line
    #[serde(alias = "enable_curving")]
    pub curving: bool,
}

impl Default for TransitionStyle {
    fn default() -> Self {
        TransitionStyle {
            easing: Easing::EaseInOutCubic,
            morphing: true,
            transparency: true,
            curving: true,
        }
    }
}

impl TransitionStyle {
    /// Straight path, hard cut, opaque hand
    pub fn baseline() -> Self {
        TransitionStyle {
            easing: Easing::Linear,
            morphing: false,
            transparency: false,
            curving: false,
        }
    }

    /// Elastic arrival with morphing and curved paths
    pub fn expressive() -> Self {
        TransitionStyle {
            easing: Easing::EaseOutElastic,
            morphing: true,
            transparency: false,
            curving: true,
        }
    }
}

/// Timed cue for one syllable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueKeyframe {
    pub index: SyllableIndex,
    pub syllable: String,
    pub shape: HandShape,
    pub position: HandPosition,
    /// When the cue is fully formed (the m2 anchor)
    pub timestamp: MediaTime,
    pub anchors: TimingAnchors,
    pub style: TransitionStyle,
}

impl CueKeyframe {
    pub fn new(
        index: SyllableIndex,
        syllable: impl Into<String>,
        target: CueTarget,
        anchors: TimingAnchors,
        style: TransitionStyle,
    ) -> Self {
        Self {
            index,
            syllable: syllable.into(),
            shape: target.shape,
            position: target.position,
            timestamp: anchors.m2,
            anchors,
            style,
        }
    }

    pub fn target(&self) -> CueTarget {
        CueTarget::new(self.shape, self.position)
    }
}

/// Zip syllables, cue mappings and anchors into keyframes
pub fn build_keyframes(
    syllables: &[SyllableUnit],
    mappings: &[CueMapping],
    timing: &TimingResolution,
    style: TransitionStyle,
) -> CueResult<Vec<CueKeyframe>> {
    let anchors = timing.anchors();
    if syllables.len() != mappings.len() || syllables.len() != anchors.len() {
        return Err(CueError::InputMissing(format!(
            "{} syllables, {} cue mappings, {} anchor sets",
            syllables.len(),
            mappings.len(),
            anchors.len()
        )));
    }

    Ok(syllables
        .iter()
        .zip(mappings)
        .zip(anchors)
        .enumerate()
        .map(|(i, ((syllable, mapping), anchors))| {
            CueKeyframe::new(
                SyllableIndex::new(i as u32),
                syllable.text.clone(),
                mapping.target,
                *anchors,
                style,
            )
        })
        .collect())
}
