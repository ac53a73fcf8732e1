//! Points and hand landmark sets
//!
//! Coordinates are normalized image units: x to the right, y down, z toward
//! the camera, the same convention as MediaPipe.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// 3D point (normalized coordinates)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Linear interpolation
    pub fn lerp(&self, other: &Point3, t: f32) -> Point3 {
        Point3 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// Distance to another point
    pub fn distance(&self, other: &Point3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Point3 {
    type Output = Point3;

    fn add(self, rhs: Point3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Point3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Point3 {
    type Output = Point3;

    fn mul(self, rhs: f32) -> Point3 {
        Point3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Quadratic Bézier through `control`
pub fn quadratic_bezier(start: &Point3, control: &Point3, end: &Point3, t: f32) -> Point3 {
    let u = 1.0 - t;
    *start * (u * u) + *control * (2.0 * u * t) + *end * (t * t)
}

/// Control point for a curved path from `start` to `end`.
///
/// Offset perpendicular to the segment (in the image plane) by
/// `ratio × segment length`, on the side away from `away_from`.
pub fn curve_control(start: &Point3, end: &Point3, away_from: &Point3, ratio: f32) -> Point3 {
    let mid = start.lerp(end, 0.5);
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-6 {
        return mid;
    }

    // Unit normal in the image plane
    let (mut nx, mut ny) = (-dy / len, dx / len);
    let to_mid_x = mid.x - away_from.x;
    let to_mid_y = mid.y - away_from.y;
    if nx * to_mid_x + ny * to_mid_y < 0.0 {
        nx = -nx;
        ny = -ny;
    }

    let offset = ratio * len;
    Point3::new(mid.x + nx * offset, mid.y + ny * offset, mid.z)
}

/// MediaPipe hand joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandJoint {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandJoint {
    /// Number of joints
    pub const fn count() -> usize {
        21
    }

    /// Landmark index in MediaPipe order
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Ordered set of the 21 hand landmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandLandmarks([Point3; HandJoint::count()]);

impl Default for HandLandmarks {
    fn default() -> Self {
        HandLandmarks([Point3::zero(); HandJoint::count()])
    }
}

impl HandLandmarks {
    pub fn new(points: [Point3; HandJoint::count()]) -> Self {
        HandLandmarks(points)
    }

    /// Landmarks from a slice; `None` unless exactly 21 points
    pub fn from_slice(points: &[Point3]) -> Option<Self> {
        let points: [Point3; HandJoint::count()] = points.try_into().ok()?;
        Some(HandLandmarks(points))
    }

    pub fn points(&self) -> &[Point3] {
        &self.0
    }

    pub fn get(&self, joint: HandJoint) -> Point3 {
        self.0[joint.index()]
    }

    /// Point by raw landmark index
    pub fn at(&self, index: usize) -> Option<Point3> {
        self.0.get(index).copied()
    }

    /// Per-landmark linear interpolation
    pub fn lerp(&self, other: &HandLandmarks, t: f32) -> HandLandmarks {
        let mut out = self.clone();
        for (p, q) in out.0.iter_mut().zip(other.0.iter()) {
            *p = p.lerp(q, t);
        }
        out
    }

    /// Scale about the origin, then move by `offset`
    pub fn scale_translate(&self, scale: f32, offset: Point3) -> HandLandmarks {
        let mut out = self.clone();
        for p in out.0.iter_mut() {
            *p = *p * scale + offset;
        }
        out
    }

    /// Move so the landmark at `index` sits on the origin
    pub fn recentred(&self, index: usize) -> HandLandmarks {
        let pivot = self.0.get(index).copied().unwrap_or_default();
        self.scale_translate(1.0, Point3::zero() - pivot)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(Point3::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_lerp() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(10.0, 10.0, 10.0);

        let mid = a.lerp(&b, 0.5);
        assert!((mid.x - 5.0).abs() < 0.01);
        assert!((mid.y - 5.0).abs() < 0.01);
        assert!((mid.z - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_bezier_endpoints() {
        let a = Point3::new(0.1, 0.2, 0.0);
        let c = Point3::new(0.5, 0.0, 0.0);
        let b = Point3::new(0.9, 0.2, 0.0);
        assert_eq!(quadratic_bezier(&a, &c, &b, 0.0), a);
        assert_eq!(quadratic_bezier(&a, &c, &b, 1.0), b);
    }

    #[test]
    fn test_curve_control_bends_away() {
        let face = Point3::new(0.5, 0.5, 0.0);
        // Vertical segment left of the face: control goes further left
        let start = Point3::new(0.3, 0.4, 0.0);
        let end = Point3::new(0.3, 0.8, 0.0);
        let control = curve_control(&start, &end, &face, 0.25);
        assert!(control.x < 0.3);
        assert!((control.x - (0.3 - 0.1)).abs() < 1e-6);
        assert!((control.y - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_curve_control_degenerate() {
        let p = Point3::new(0.2, 0.2, 0.0);
        assert_eq!(curve_control(&p, &p, &Point3::zero(), 0.25), p);
    }

    #[test]
    fn test_landmarks_from_slice() {
        assert!(HandLandmarks::from_slice(&[Point3::zero(); 20]).is_none());
        let lm = HandLandmarks::from_slice(&[Point3::new(1.0, 2.0, 3.0); 21]).unwrap();
        assert_eq!(lm.get(HandJoint::IndexTip), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(HandJoint::MiddleTip.index(), 12);
    }

    #[test]
    fn test_recentre_and_place() {
        let mut points = [Point3::zero(); 21];
        points[8] = Point3::new(0.1, -0.2, 0.0);
        let lm = HandLandmarks::new(points).recentred(8);
        assert_eq!(lm.get(HandJoint::IndexTip), Point3::zero());

        let placed = lm.scale_translate(2.0, Point3::new(0.5, 0.5, 0.0));
        assert_eq!(placed.get(HandJoint::IndexTip), Point3::new(0.5, 0.5, 0.0));
        assert!((placed.get(HandJoint::Wrist).x - 0.3).abs() < 1e-6);
    }
}
