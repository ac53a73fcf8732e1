//! LPC position targets around the face
//!
//! The signer cues with the right hand, which appears on the left of the
//! image. Targets are computed per frame so the hand follows head motion.

use cued_core::HandPosition;
use serde::{Deserialize, Serialize};

use crate::{FaceFrame, Point3};

/// Face-mesh landmark indices used for targets
pub mod mesh {
    /// Right mouth corner (image left)
    pub const MOUTH_CORNER: usize = 61;
    /// Chin tip
    pub const CHIN: usize = 152;
    /// Right cheekbone
    pub const CHEEK: usize = 50;
    /// Right face edge at eye level
    pub const FACE_EDGE: usize = 234;
    /// Minimum landmark count of a usable mesh
    pub const MIN_LANDMARKS: usize = 468;
}

/// Target as fractions of the face box, from its top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxFraction {
    pub fx: f32,
    pub fy: f32,
}

impl BoxFraction {
    pub const fn new(fx: f32, fy: f32) -> Self {
        Self { fx, fy }
    }
}

/// Position targets for the five LPC positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionMap {
    pub side: BoxFraction,
    pub mouth: BoxFraction,
    pub chin: BoxFraction,
    pub cheek: BoxFraction,
    pub throat: BoxFraction,
    /// Prefer face-mesh landmarks over box fractions when present
    pub use_landmarks: bool,
}

impl Default for PositionMap {
    fn default() -> Self {
        PositionMap {
            side: BoxFraction::new(-0.35, 0.9),
            mouth: BoxFraction::new(0.3, 0.78),
            chin: BoxFraction::new(0.5, 0.98),
            cheek: BoxFraction::new(0.15, 0.55),
            throat: BoxFraction::new(0.5, 1.25),
            use_landmarks: true,
        }
    }
}

impl PositionMap {
    /// Box fractions only, ignoring any face mesh
    pub fn box_only() -> Self {
        PositionMap {
            use_landmarks: false,
            ..Self::default()
        }
    }

    fn fraction(&self, position: HandPosition) -> BoxFraction {
        match position {
            HandPosition::Mouth => self.mouth,
            HandPosition::Chin => self.chin,
            HandPosition::Cheek => self.cheek,
            HandPosition::Throat => self.throat,
            HandPosition::Side | HandPosition::Unknown => self.side,
        }
    }

    /// Target point for `position` on `face`. Unknown renders at the side.
    pub fn target(&self, position: HandPosition, face: &FaceFrame) -> Point3 {
        if self.use_landmarks {
            if let Some(point) = face
                .landmarks
                .as_deref()
                .and_then(|lm| mesh_target(position, lm, face))
            {
                return point;
            }
        }
        let f = self.fraction(position);
        face.bbox.at(f.fx, f.fy)
    }
}

fn mesh_target(position: HandPosition, lm: &[Point3], face: &FaceFrame) -> Option<Point3> {
    if lm.len() < mesh::MIN_LANDMARKS {
        return None;
    }
    let w = face.bbox.width;
    let h = face.bbox.height;
    let flat = |p: Point3| Point3::new(p.x, p.y, 0.0);

    let point = match position {
        HandPosition::Mouth => flat(lm[mesh::MOUTH_CORNER]) + Point3::new(-0.05 * w, 0.0, 0.0),
        HandPosition::Chin => flat(lm[mesh::CHIN]),
        HandPosition::Cheek => flat(lm[mesh::CHEEK]),
        HandPosition::Throat => flat(lm[mesh::CHIN]) + Point3::new(0.0, 0.25 * h, 0.0),
        HandPosition::Side | HandPosition::Unknown => Point3::new(
            lm[mesh::FACE_EDGE].x - 0.35 * w,
            lm[mesh::CHIN].y - 0.1 * h,
            0.0,
        ),
    };
    point.is_finite().then_some(point)
}
