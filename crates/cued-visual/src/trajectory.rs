//! Trajectory - the synthesized hand, frame by frame

use std::ops::Index;
use std::path::Path;

use cued_core::{CueError, CueResult, FrameIndex, FrameRate, HandPosition, HandShape, MediaTime};
use serde::{Deserialize, Serialize};

use crate::HandLandmarks;

/// Hand state for one output frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationFrame {
    pub index: FrameIndex,
    pub timestamp: MediaTime,
    pub landmarks: HandLandmarks,
    /// Opacity [0.0 - 1.0]
    pub alpha: f32,
    /// Shape shown (the target shape once past the transition midpoint)
    pub shape: HandShape,
    pub position: HandPosition,
}

/// Gap-free frame sequence covering a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub frame_rate: FrameRate,
    pub duration: MediaTime,
    frames: Vec<AnimationFrame>,
}

impl Trajectory {
    pub(crate) fn new(frame_rate: FrameRate, duration: MediaTime, frames: Vec<AnimationFrame>) -> Self {
        Self {
            frame_rate,
            duration,
            frames,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AnimationFrame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnimationFrame> {
        self.frames.iter()
    }

    /// Frame on screen at `t`
    pub fn frame_at(&self, t: MediaTime) -> Option<&AnimationFrame> {
        self.frames.get(self.frame_rate.frame_at(t).as_usize())
    }

    /// Frame indices are 0..n and timestamps strictly increase
    pub fn is_contiguous(&self) -> bool {
        self.frames
            .iter()
            .enumerate()
            .all(|(i, f)| f.index.as_usize() == i)
            && self.frames.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }

    pub fn to_json(&self) -> CueResult<String> {
        serde_json::to_string(self).map_err(|e| CueError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> CueResult<Self> {
        serde_json::from_str(json).map_err(|e| CueError::Serialization(e.to_string()))
    }

    /// Write as JSON to `path`
    pub fn write_json(&self, path: impl AsRef<Path>) -> CueResult<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer(writer, self).map_err(|e| CueError::Serialization(e.to_string()))
    }
}

impl Index<usize> for Trajectory {
    type Output = AnimationFrame;

    fn index(&self, index: usize) -> &AnimationFrame {
        &self.frames[index]
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a AnimationFrame;
    type IntoIter = std::slice::Iter<'a, AnimationFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
