//! Easing curves for cue transitions

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use cued_core::CueError;
use serde::{Deserialize, Serialize};

/// Easing function applied to transition progress.
///
/// Every curve maps 0 to 0 and 1 to 1. Elastic and back overshoot outside
/// `[0, 1]` in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    #[default]
    EaseInOutCubic,
    EaseOutElastic,
    EaseInOutBack,
}

impl Easing {
    pub fn all() -> &'static [Easing] {
        &[
            Easing::Linear,
            Easing::EaseInOutCubic,
            Easing::EaseOutElastic,
            Easing::EaseInOutBack,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::EaseInOutCubic => "ease_in_out_cubic",
            Easing::EaseOutElastic => "ease_out_elastic",
            Easing::EaseInOutBack => "ease_in_out_back",
        }
    }

    /// Eased value of `p` (clamped to `[0, 1]` first)
    pub fn apply(self, p: f32) -> f32 {
        let p = p.clamp(0.0, 1.0);
        match self {
            Easing::Linear => p,
            Easing::EaseInOutCubic => {
                if p < 0.5 {
                    4.0 * p * p * p
                } else {
                    1.0 - (-2.0 * p + 2.0).powi(3) / 2.0
                }
            }
            Easing::EaseOutElastic => {
                if p == 0.0 || p == 1.0 {
                    return p;
                }
                let c4 = (2.0 * PI) / 3.0;
                2f32.powf(-10.0 * p) * ((p * 10.0 - 0.75) * c4).sin() + 1.0
            }
            Easing::EaseInOutBack => {
                let c1 = 1.70158_f32;
                let c2 = c1 * 1.525;
                if p < 0.5 {
                    ((2.0 * p).powi(2) * ((c2 + 1.0) * 2.0 * p - c2)) / 2.0
                } else {
                    ((2.0 * p - 2.0).powi(2) * ((c2 + 1.0) * (p * 2.0 - 2.0) + c2) + 2.0) / 2.0
                }
            }
        }
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Easing {
    type Err = CueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Easing::all()
            .iter()
            .copied()
            .find(|e| e.name() == s.trim())
            .ok_or_else(|| CueError::InvalidConfig(format!("unknown easing function '{}'", s)))
    }
}
