//! Feature streams and landmark feature extraction
//!
//! The recognizer reads three per-frame streams: 7 hand-shape features,
//! 18 hand-position features and 8 lip features. [`FeatureExtractor`]
//! derives them from face-mesh and hand landmarks, normalized by face width
//! so they are invariant to the signer's distance from the camera.

use cued_core::{CueError, CueResult};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::RecognizerConfig;

pub const HAND_SHAPE_FEATURES: usize = 7;
pub const HAND_POS_FEATURES: usize = 18;
pub const LIP_FEATURES: usize = 8;

/// Aligned per-frame feature matrices, one row per frame
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStreams {
    hand_shape: Array2<f32>,
    hand_pos: Array2<f32>,
    lips: Array2<f32>,
}

impl FeatureStreams {
    /// All three streams must have the same, non-zero number of frames
    pub fn new(hand_shape: Array2<f32>, hand_pos: Array2<f32>, lips: Array2<f32>) -> CueResult<Self> {
        let frames = hand_shape.nrows();
        if hand_pos.nrows() != frames || lips.nrows() != frames {
            return Err(CueError::FeatureMismatch(format!(
                "stream lengths differ: hand_shape {}, hand_pos {}, lips {}",
                frames,
                hand_pos.nrows(),
                lips.nrows()
            )));
        }
        if frames == 0 {
            return Err(CueError::InputMissing("feature streams have no frames".into()));
        }
        Ok(Self {
            hand_shape,
            hand_pos,
            lips,
        })
    }

    /// Stack extracted frames into streams
    pub fn from_frames(frames: &[FrameFeatures]) -> CueResult<Self> {
        let rows = frames.len();
        let stack = |dim: usize, pick: fn(&FrameFeatures) -> &[f32]| {
            Array2::from_shape_fn((rows, dim), |(t, j)| pick(&frames[t])[j])
        };
        Self::new(
            stack(HAND_SHAPE_FEATURES, |f| &f.hand_shape),
            stack(HAND_POS_FEATURES, |f| &f.hand_pos),
            stack(LIP_FEATURES, |f| &f.lips),
        )
    }

    pub fn len(&self) -> usize {
        self.hand_shape.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feature widths in (hand_shape, hand_pos, lips) order
    pub fn dims(&self) -> [usize; 3] {
        [self.hand_shape.ncols(), self.hand_pos.ncols(), self.lips.ncols()]
    }

    pub fn hand_shape(&self) -> ArrayView2<'_, f32> {
        self.hand_shape.view()
    }

    pub fn hand_pos(&self) -> ArrayView2<'_, f32> {
        self.hand_pos.view()
    }

    pub fn lips(&self) -> ArrayView2<'_, f32> {
        self.lips.view()
    }

    /// Streams in encoder order
    pub fn streams(&self) -> [ArrayView2<'_, f32>; 3] {
        [self.hand_shape(), self.hand_pos(), self.lips()]
    }

    /// Check widths against what the recognizer was built for
    pub fn check(&self, config: &RecognizerConfig) -> CueResult<()> {
        let expected = config.stream_dims();
        if self.dims() != expected {
            return Err(CueError::FeatureMismatch(format!(
                "stream widths {:?}, recognizer expects {:?}",
                self.dims(),
                expected
            )));
        }
        Ok(())
    }
}

/// Normalized landmark coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn distance(&self, other: &Landmark) -> f32 {
        let (dx, dy, dz) = (other.x - self.x, other.y - self.y, other.z - self.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Landmarks detected in one video frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Face-mesh landmarks (468)
    pub face: Vec<Landmark>,
    /// Hand landmarks (21)
    pub hand: Vec<Landmark>,
}

impl LandmarkFrame {
    fn face(&self, idx: usize) -> Option<Landmark> {
        self.face.get(idx).copied().filter(Landmark::is_finite)
    }

    fn hand(&self, idx: usize) -> Option<Landmark> {
        self.hand.get(idx).copied().filter(Landmark::is_finite)
    }
}

/// Features of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFeatures {
    pub hand_shape: [f32; HAND_SHAPE_FEATURES],
    pub hand_pos: [f32; HAND_POS_FEATURES],
    pub lips: [f32; LIP_FEATURES],
}

mod mesh {
    pub const FACE_LEFT: usize = 234;
    pub const FACE_RIGHT: usize = 454;
    pub const LIP_LEFT: usize = 61;
    pub const LIP_RIGHT: usize = 291;
    pub const LIP_TOP: usize = 0;
    pub const LIP_BOTTOM: usize = 17;
    pub const LIP_OUTER: [usize; 20] = [
        61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291, 375, 321, 405, 314, 17, 84, 181, 91, 146,
    ];
    /// Reference points the hand is measured against; the angle is also
    /// taken towards `CHIN_CENTER`.
    pub const POSITION_REFS: [usize; 5] = [234, 200, 214, 454, 280];
    pub const CHIN_CENTER: usize = 200;

    pub const WRIST: usize = 0;
    pub const MIDDLE_MCP: usize = 9;
    pub const INDEX_TIP: usize = 8;
    pub const POSITION_JOINTS: [usize; 3] = [8, 9, 12];
    pub const FINGERTIPS: [usize; 5] = [4, 8, 12, 16, 20];
}

const EPSILON: f32 = 1e-6;

/// Per-frame feature extraction from landmarks.
///
/// Motion features need the two preceding frames; a frame without them, or
/// with any required landmark missing or non-finite, yields no features.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(
        &self,
        current: &LandmarkFrame,
        prev: Option<&LandmarkFrame>,
        prev2: Option<&LandmarkFrame>,
    ) -> Option<FrameFeatures> {
        let face_width = current
            .face(mesh::FACE_RIGHT)?
            .distance(&current.face(mesh::FACE_LEFT)?);
        if face_width <= EPSILON {
            return None;
        }

        let hand_span = match (current.hand(mesh::WRIST), current.hand(mesh::MIDDLE_MCP)) {
            (Some(wrist), Some(mcp)) => {
                let span = wrist.distance(&mcp);
                if span <= EPSILON {
                    face_width
                } else {
                    span
                }
            }
            _ => face_width,
        };

        let mut hand_pos = [0.0; HAND_POS_FEATURES];
        let mut k = 0;
        for joint in mesh::POSITION_JOINTS {
            let h = current.hand(joint)?;
            for reference in mesh::POSITION_REFS {
                let f = current.face(reference)?;
                hand_pos[k] = h.distance(&f) / face_width;
                k += 1;
                if reference == mesh::CHIN_CENTER {
                    let dx = (f.x - h.x) / face_width;
                    let dy = (f.y - h.y) / face_width;
                    hand_pos[k] = dy.atan2(dx);
                    k += 1;
                }
            }
        }

        let mut hand_shape = [0.0; HAND_SHAPE_FEATURES];
        let wrist = current.hand(mesh::WRIST)?;
        for (slot, tip) in hand_shape.iter_mut().zip(mesh::FINGERTIPS) {
            *slot = wrist.distance(&current.hand(tip)?) / hand_span;
        }

        let top = current.face(mesh::LIP_TOP)?;
        let lip_width = current.face(mesh::LIP_LEFT)?.distance(&current.face(mesh::LIP_RIGHT)?);
        let lip_height = top.distance(&current.face(mesh::LIP_BOTTOM)?);
        let contour = mesh::LIP_OUTER
            .iter()
            .map(|&i| current.face(i).map(|p| (p.x, p.y)))
            .collect::<Option<Vec<_>>>()?;

        let (prev, prev2) = (prev?, prev2?);
        let prev_top = prev.face(mesh::LIP_TOP)?;
        let prev2_top = prev2.face(mesh::LIP_TOP)?;
        let vel_x = (top.x - prev_top.x) / face_width;
        let vel_y = (top.y - prev_top.y) / face_width;
        let prev_vel_x = (prev_top.x - prev2_top.x) / face_width;
        let prev_vel_y = (prev_top.y - prev2_top.y) / face_width;

        let lips = [
            lip_width / face_width,
            lip_height / face_width,
            polygon_area(&contour) / (face_width * face_width),
            mean_contour_curvature(&contour),
            vel_x,
            vel_y,
            vel_x - prev_vel_x,
            vel_y - prev_vel_y,
        ];

        let tip = current.hand(mesh::INDEX_TIP)?;
        let prev_tip = prev.hand(mesh::INDEX_TIP)?;
        hand_shape[5] = (tip.x - prev_tip.x) / hand_span;
        hand_shape[6] = (tip.y - prev_tip.y) / hand_span;

        Some(FrameFeatures {
            hand_shape,
            hand_pos,
            lips,
        })
    }

    /// Extract every frame and keep the valid ones, in order
    pub fn extract_all(&self, frames: &[LandmarkFrame]) -> Vec<FrameFeatures> {
        (0..frames.len())
            .filter_map(|t| {
                let prev = t.checked_sub(1).map(|i| &frames[i]);
                let prev2 = t.checked_sub(2).map(|i| &frames[i]);
                self.extract(&frames[t], prev, prev2)
            })
            .collect()
    }

    /// Streams from a landmark sequence; no valid frame is `InputMissing`
    pub fn extract_streams(&self, frames: &[LandmarkFrame]) -> CueResult<FeatureStreams> {
        let features = self.extract_all(frames);
        if features.is_empty() {
            return Err(CueError::InputMissing(format!(
                "no frame out of {} had usable landmarks",
                frames.len()
            )));
        }
        FeatureStreams::from_frames(&features)
    }
}

/// Shoelace area
fn polygon_area(points: &[(f32, f32)]) -> f32 {
    let n = points.len();
    let twice: f32 = (0..n)
        .map(|i| {
            let (xi, yi) = points[i];
            let (xj, yj) = points[(i + 1) % n];
            xi * yj - xj * yi
        })
        .sum();
    twice.abs() * 0.5
}

/// Mean interior angle of a closed contour, skipping degenerate vertices
fn mean_contour_curvature(points: &[(f32, f32)]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let angles: Vec<f32> = (0..n)
        .filter_map(|i| {
            let (px, py) = points[(i + n - 1) % n];
            let (cx, cy) = points[i];
            let (nx, ny) = points[(i + 1) % n];
            let (v1x, v1y) = (px - cx, py - cy);
            let (v2x, v2y) = (nx - cx, ny - cy);
            let n1 = (v1x * v1x + v1y * v1y).sqrt();
            let n2 = (v2x * v2x + v2y * v2y).sqrt();
            if n1 < EPSILON || n2 < EPSILON {
                return None;
            }
            let cos = ((v1x * v2x + v1y * v2y) / (n1 * n2)).clamp(-1.0, 1.0);
            Some(cos.acos())
        })
        .collect();
    if angles.is_empty() {
        0.0
    } else {
        angles.iter().sum::<f32>() / angles.len() as f32
    }
}
