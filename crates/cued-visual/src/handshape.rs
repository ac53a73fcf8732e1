//! Hand-shape templates
//!
//! A template is the 21-landmark hand for one LPC shape, in normalized image
//! units as seen at the reference face size, re-centred so the shape's
//! pointing landmark is the origin. Placing a cue is then a scale and a
//! translation onto the position target.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use cued_core::{CueError, CueResult, HandShape};
use tracing::debug;

use crate::{HandJoint, HandLandmarks, Point3};

/// Landmark that touches the position target for `shape`.
///
/// Shapes 1 and 6 point with the index finger, the others with the middle
/// finger.
pub fn pointing_landmark(shape: HandShape) -> HandJoint {
    match shape {
        HandShape::One | HandShape::Six => HandJoint::IndexTip,
        _ => HandJoint::MiddleTip,
    }
}

/// File name of the coordinate file for a shape
pub fn template_file_name(shape: HandShape) -> String {
    format!("handshape_{}.csv", shape.id())
}

/// Templates for every known shape
#[derive(Debug, Clone)]
pub struct HandShapeLibrary {
    templates: HashMap<HandShape, HandLandmarks>,
}

impl Default for HandShapeLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl HandShapeLibrary {
    /// Procedurally generated right-hand templates
    pub fn builtin() -> Self {
        let templates = HandShape::all()
            .iter()
            .map(|&shape| {
                let raw = procedural(shape);
                (shape, raw.recentred(pointing_landmark(shape).index()))
            })
            .collect();
        Self { templates }
    }

    /// Load `handshape_<n>.csv` for n in 1..=8 from `dir`
    pub fn load_dir(dir: impl AsRef<Path>) -> CueResult<Self> {
        let dir = dir.as_ref();
        let mut templates = HashMap::new();

        for &shape in HandShape::all() {
            let path = dir.join(template_file_name(shape));
            if !path.is_file() {
                return Err(CueError::InputMissing(format!(
                    "hand shape file {}",
                    path.display()
                )));
            }
            let file = std::fs::File::open(&path)?;
            let raw = read_landmarks(file)
                .map_err(|e| CueError::Serialization(format!("{}: {}", path.display(), e)))?;
            templates.insert(shape, raw.recentred(pointing_landmark(shape).index()));
        }

        debug!(dir = %dir.display(), "loaded hand shape templates");
        Ok(Self { templates })
    }

    /// Template for `shape`; unknown shapes render with the neutral shape
    pub fn template(&self, shape: HandShape) -> &HandLandmarks {
        let key = if shape.is_known() { shape } else { HandShape::NEUTRAL };
        // Every known shape is present by construction
        &self.templates[&key]
    }
}

/// Parse 21 `x,y,z` rows. A leading header row and a missing z are accepted.
pub fn read_landmarks<R: Read>(reader: R) -> Result<HandLandmarks, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut points = Vec::with_capacity(HandJoint::count());
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let values: Result<Vec<f32>, _> = record.iter().take(3).map(str::parse::<f32>).collect();
        let values = match values {
            Ok(v) => v,
            Err(_) if row == 0 => continue,
            Err(e) => return Err(format!("row {}: {}", row + 1, e)),
        };
        if values.len() < 2 {
            return Err(format!("row {}: expected x,y[,z]", row + 1));
        }
        points.push(Point3::new(values[0], values[1], values.get(2).copied().unwrap_or(0.0)));
    }

    HandLandmarks::from_slice(&points)
        .ok_or_else(|| format!("expected {} landmarks, found {}", HandJoint::count(), points.len()))
}

// Procedural templates, right hand facing the camera, fingers up.

const WRIST: Point3 = Point3::new(0.0, 0.0, 0.0);
const THUMB_CMC: Point3 = Point3::new(-0.025, -0.02, 0.0);
const MCP: [Point3; 4] = [
    Point3::new(-0.022, -0.085, 0.0),
    Point3::new(0.0, -0.09, 0.0),
    Point3::new(0.02, -0.085, 0.0),
    Point3::new(0.038, -0.075, 0.0),
];
const SEGMENTS: [[f32; 3]; 4] = [
    [0.035, 0.022, 0.02],
    [0.04, 0.025, 0.022],
    [0.037, 0.023, 0.02],
    [0.028, 0.018, 0.017],
];
const SPREAD: [f32; 4] = [-0.12, 0.0, 0.1, 0.2];
const THUMB_SEGMENTS: [f32; 3] = [0.03, 0.028, 0.022];

/// Extended fingers for a shape: (thumb, [index, middle, ring, pinky], joined)
fn finger_layout(shape: HandShape) -> (bool, [bool; 4], bool) {
    match shape {
        HandShape::One => (false, [true, false, false, false], false),
        HandShape::Two => (false, [true, true, false, false], false),
        HandShape::Three => (false, [false, true, true, true], false),
        HandShape::Four => (false, [true, true, true, true], false),
        HandShape::Six => (true, [true, false, false, false], false),
        HandShape::Seven => (true, [true, true, false, false], false),
        HandShape::Eight => (true, [true, true, false, false], true),
        HandShape::Five | HandShape::Unknown => (true, [true, true, true, true], false),
    }
}

fn along(from: Point3, angle: f32, length: f32) -> Point3 {
    from + Point3::new(angle.sin(), -angle.cos(), 0.0) * length
}

fn procedural(shape: HandShape) -> HandLandmarks {
    let (thumb, fingers, joined) = finger_layout(shape);
    let mut points = [Point3::zero(); 21];
    points[HandJoint::Wrist.index()] = WRIST;

    // Thumb: 1..=4
    points[1] = THUMB_CMC;
    if thumb {
        let angle = -1.0;
        let mut p = THUMB_CMC;
        for (k, len) in THUMB_SEGMENTS.iter().enumerate() {
            p = along(p, angle + 0.15 * k as f32, *len);
            points[2 + k] = p;
        }
    } else {
        points[2] = THUMB_CMC + Point3::new(0.012, -0.02, -0.01);
        points[3] = Point3::new(0.004, -0.052, -0.02);
        points[4] = Point3::new(0.016, -0.06, -0.025);
    }

    // Fingers: index 5..=8, middle 9..=12, ring 13..=16, pinky 17..=20
    for (f, extended) in fingers.iter().enumerate() {
        let base = 5 + 4 * f;
        let mcp = MCP[f];
        points[base] = mcp;
        if *extended {
            let angle = if joined { [-0.02, 0.02, 0.0, 0.0][f] } else { SPREAD[f] };
            let mut p = mcp;
            for (k, len) in SEGMENTS[f].iter().enumerate() {
                p = along(p, angle, *len);
                points[base + 1 + k] = p;
            }
        } else {
            points[base + 1] = along(mcp, 0.0, SEGMENTS[f][0] * 0.5) + Point3::new(0.0, 0.0, -0.02);
            points[base + 2] = mcp + Point3::new(0.0, 0.005, -0.03);
            points[base + 3] = mcp + Point3::new(0.0, 0.02, -0.02);
        }
    }

    HandLandmarks::new(points)
}
