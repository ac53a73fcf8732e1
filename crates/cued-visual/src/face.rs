//! Face track - per-frame face geometry from the vision collaborator
//!
//! Detection can drop frames. Lookups forward-fill the last detected face,
//! and frames before the first detection use a default box.

use cued_core::FrameIndex;
use serde::{Deserialize, Serialize};

use crate::Point3;

/// Face bounding box in normalized image coordinates (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for FaceBox {
    /// Centred face covering the reference height
    fn default() -> Self {
        FaceBox {
            x: 0.4,
            y: 0.2,
            width: 0.2,
            height: 0.3,
        }
    }
}

impl FaceBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> Point3 {
        Point3::new(self.x + self.width * 0.5, self.y + self.height * 0.5, 0.0)
    }

    /// Point at fractions of the box size from its top-left corner
    pub fn at(&self, fx: f32, fy: f32) -> Point3 {
        Point3::new(self.x + self.width * fx, self.y + self.height * fy, 0.0)
    }

    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Face geometry for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceFrame {
    pub bbox: FaceBox,
    /// MediaPipe face-mesh landmarks, when the detector supplies them
    #[serde(default)]
    pub landmarks: Option<Vec<Point3>>,
}

impl FaceFrame {
    pub fn from_box(bbox: FaceBox) -> Self {
        Self {
            bbox,
            landmarks: None,
        }
    }

    pub fn with_landmarks(bbox: FaceBox, landmarks: Vec<Point3>) -> Self {
        Self {
            bbox,
            landmarks: Some(landmarks),
        }
    }
}

/// Per-frame faces with gap filling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "FaceTrackData", into = "FaceTrackData")]
pub struct FaceTrack {
    frames: Vec<Option<FaceFrame>>,
    fallback: FaceFrame,
    /// For every frame, the index of the face it resolves to
    filled: Vec<Option<usize>>,
}

impl Default for FaceFrame {
    fn default() -> Self {
        FaceFrame::from_box(FaceBox::default())
    }
}

impl FaceTrack {
    /// Track from per-frame detections (`None` = no face found)
    pub fn new(frames: Vec<Option<FaceFrame>>) -> Self {
        Self::with_fallback(frames, FaceFrame::default())
    }

    pub fn with_fallback(frames: Vec<Option<FaceFrame>>, fallback: FaceFrame) -> Self {
        let mut filled = Vec::with_capacity(frames.len());
        let mut last = None;
        for (i, frame) in frames.iter().enumerate() {
            if frame.as_ref().map(|f| f.bbox.is_valid()).unwrap_or(false) {
                last = Some(i);
            }
            filled.push(last);
        }
        Self {
            frames,
            fallback,
            filled,
        }
    }

    /// The same face on every frame
    pub fn constant(face: FaceFrame) -> Self {
        Self::with_fallback(Vec::new(), face)
    }

    /// Face for `index`; frames past the end reuse the last known face
    pub fn frame_at(&self, index: FrameIndex) -> &FaceFrame {
        let slot = if self.filled.is_empty() {
            None
        } else {
            let i = index.as_usize().min(self.filled.len() - 1);
            self.filled[i]
        };
        slot.and_then(|i| self.frames[i].as_ref())
            .unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames with a usable detection
    pub fn detected(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.as_ref().map(|f| f.bbox.is_valid()).unwrap_or(false))
            .count()
    }
}

#[derive(Serialize, Deserialize)]
struct FaceTrackData {
    frames: Vec<Option<FaceFrame>>,
    #[serde(default)]
    fallback: FaceFrame,
}

impl From<FaceTrackData> for FaceTrack {
    fn from(data: FaceTrackData) -> Self {
        FaceTrack::with_fallback(data.frames, data.fallback)
    }
}

impl From<FaceTrack> for FaceTrackData {
    fn from(track: FaceTrack) -> Self {
        FaceTrackData {
            frames: track.frames,
            fallback: track.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32) -> Option<FaceFrame> {
        Some(FaceFrame::from_box(FaceBox::new(x, 0.2, 0.2, 0.3)))
    }

    #[test]
    fn test_forward_fill() {
        let track = FaceTrack::new(vec![None, face(0.1), None, None, face(0.3), None]);

        assert_eq!(track.frame_at(FrameIndex(0)).bbox, FaceBox::default());
        assert_eq!(track.frame_at(FrameIndex(1)).bbox.x, 0.1);
        assert_eq!(track.frame_at(FrameIndex(3)).bbox.x, 0.1);
        assert_eq!(track.frame_at(FrameIndex(4)).bbox.x, 0.3);
        assert_eq!(track.frame_at(FrameIndex(5)).bbox.x, 0.3);
        // Past the end
        assert_eq!(track.frame_at(FrameIndex(99)).bbox.x, 0.3);
        assert_eq!(track.detected(), 2);
    }

    #[test]
    fn test_invalid_box_skipped() {
        let bad = Some(FaceFrame::from_box(FaceBox::new(0.5, 0.5, 0.0, 0.3)));
        let track = FaceTrack::new(vec![face(0.1), bad]);
        assert_eq!(track.frame_at(FrameIndex(1)).bbox.x, 0.1);
    }

    #[test]
    fn test_empty_track_uses_fallback() {
        let track = FaceTrack::default();
        assert_eq!(track.frame_at(FrameIndex(10)).bbox, FaceBox::default());

        let fixed = FaceFrame::from_box(FaceBox::new(0.3, 0.1, 0.25, 0.35));
        let track = FaceTrack::constant(fixed.clone());
        assert_eq!(track.frame_at(FrameIndex(7)), &fixed);
    }

    #[test]
    fn test_box_geometry() {
        let b = FaceBox::new(0.4, 0.2, 0.2, 0.3);
        let c = b.center();
        assert!((c.x - 0.5).abs() < 1e-6);
        assert!((c.y - 0.35).abs() < 1e-6);
        let chin = b.at(0.5, 1.0);
        assert!((chin.y - 0.5).abs() < 1e-6);
    }
}
