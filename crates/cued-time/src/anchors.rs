//! Phase anchors and the ratios that place them

use cued_core::{CueError, CueResult, MediaTime};
use serde::{Deserialize, Serialize};

/// Relative placement of the four anchors inside a syllable span
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseRatios {
    pub a1: f64,
    pub m1: f64,
    pub m2: f64,
    pub a3: f64,
}

impl Default for PhaseRatios {
    fn default() -> Self {
        PhaseRatios {
            a1: 0.0,
            m1: 0.2,
            m2: 0.6,
            a3: 1.0,
        }
    }
}

impl PhaseRatios {
    /// Validated ratios
    pub fn new(a1: f64, m1: f64, m2: f64, a3: f64) -> CueResult<Self> {
        let ratios = PhaseRatios { a1, m1, m2, a3 };
        ratios.validate()?;
        Ok(ratios)
    }

    /// Cue formed early in the syllable, for fast speech
    pub fn early_formation() -> Self {
        PhaseRatios {
            a1: 0.0,
            m1: 0.1,
            m2: 0.4,
            a3: 1.0,
        }
    }

    /// Require `0 <= a1 <= m1 <= m2 <= a3 <= 1`
    pub fn validate(&self) -> CueResult<()> {
        let values = [self.a1, self.m1, self.m2, self.a3];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CueError::InvalidConfig(format!(
                "phase ratios must be finite: {:?}",
                self
            )));
        }
        let ordered = self.a1 >= 0.0
            && self.a1 <= self.m1
            && self.m1 <= self.m2
            && self.m2 <= self.a3
            && self.a3 <= 1.0;
        if !ordered {
            return Err(CueError::InvalidConfig(format!(
                "phase ratios must satisfy 0 <= a1 <= m1 <= m2 <= a3 <= 1, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Anchors of one syllable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingAnchors {
    pub a1: MediaTime,
    pub m1: MediaTime,
    pub m2: MediaTime,
    pub a3: MediaTime,
}

impl TimingAnchors {
    /// Place anchors inside `[start, end]`
    pub fn from_span(start: MediaTime, end: MediaTime, ratios: &PhaseRatios) -> Self {
        TimingAnchors {
            a1: start.lerp(end, ratios.a1),
            m1: start.lerp(end, ratios.m1),
            m2: start.lerp(end, ratios.m2),
            a3: start.lerp(end, ratios.a3),
        }
    }

    /// `a1 <= m1 <= m2 <= a3`
    pub fn is_ordered(&self) -> bool {
        self.a1 <= self.m1 && self.m1 <= self.m2 && self.m2 <= self.a3
    }
}

/// Why the resolver fell back to proportional timing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// No alignment was supplied
    NoAlignment,
    /// The supplied alignment failed validation
    InvalidAlignment(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::NoAlignment => write!(f, "no alignment"),
            FallbackReason::InvalidAlignment(msg) => write!(f, "invalid alignment: {}", msg),
        }
    }
}

/// Resolved anchors, tagged with how they were obtained
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TimingResolution {
    Aligned(Vec<TimingAnchors>),
    Fallback {
        anchors: Vec<TimingAnchors>,
        reason: FallbackReason,
    },
}

impl TimingResolution {
    pub fn anchors(&self) -> &[TimingAnchors] {
        match self {
            TimingResolution::Aligned(anchors) => anchors,
            TimingResolution::Fallback { anchors, .. } => anchors,
        }
    }

    pub fn into_anchors(self) -> Vec<TimingAnchors> {
        match self {
            TimingResolution::Aligned(anchors) => anchors,
            TimingResolution::Fallback { anchors, .. } => anchors,
        }
    }

    pub fn is_aligned(&self) -> bool {
        matches!(self, TimingResolution::Aligned(_))
    }

    pub fn len(&self) -> usize {
        self.anchors().len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors().is_empty()
    }

    /// Anchors ordered within and across syllables
    pub fn is_consistent(&self) -> bool {
        let anchors = self.anchors();
        anchors.iter().all(TimingAnchors::is_ordered)
            && anchors.windows(2).all(|w| w[1].a1 >= w[0].a3)
    }
}
