//! Time primitives for the cue pipeline
//!
//! All pipeline timestamps are integer microseconds from the start of the
//! clip, so ordering and non-overlap checks between anchors are exact.
//! Floating point only appears when computing interpolation progress.

use std::ops::{Add, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::FrameIndex;

/// Media time - microseconds since the start of the clip
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTime(pub i64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);
    pub const MAX: MediaTime = MediaTime(i64::MAX);

    #[inline]
    pub fn from_micros(micros: i64) -> Self {
        MediaTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        MediaTime(millis * 1000)
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        MediaTime((secs * 1_000_000.0).round() as i64)
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Point at `ratio` of the way from `self` to `end`, rounded to the microsecond
    #[inline]
    pub fn lerp(self, end: MediaTime, ratio: f64) -> MediaTime {
        let span = (end.0 - self.0) as f64;
        MediaTime(self.0 + (span * ratio).round() as i64)
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        MediaTime(self.0.saturating_add(duration.as_micros() as i64))
    }

    #[inline]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        MediaTime(self.0.saturating_sub(duration.as_micros() as i64))
    }
}

impl Add<Duration> for MediaTime {
    type Output = MediaTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        MediaTime(self.0 + rhs.as_micros() as i64)
    }
}

impl Sub<MediaTime> for MediaTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: MediaTime) -> Self::Output {
        let diff = self.0 - rhs.0;
        if diff >= 0 {
            Duration::from_micros(diff as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl std::fmt::Debug for MediaTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}s)", self.as_secs_f64())
    }
}

/// Output frame rate in frames per second
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameRate(f64);

impl FrameRate {
    /// Standard PAL rate, the default for generated overlays
    pub const PAL: FrameRate = FrameRate(25.0);

    /// Create a frame rate; `None` unless `fps` is finite and positive
    pub fn new(fps: f64) -> Option<Self> {
        (fps.is_finite() && fps > 0.0).then_some(FrameRate(fps))
    }

    #[inline]
    pub fn fps(self) -> f64 {
        self.0
    }

    /// Frame interval in seconds
    #[inline]
    pub fn interval_secs(self) -> f64 {
        1.0 / self.0
    }

    /// Number of frames covering `duration`: `round(duration * fps)`
    pub fn frame_count(self, duration: MediaTime) -> usize {
        if !duration.is_positive() {
            return 0;
        }
        (duration.as_secs_f64() * self.0).round() as usize
    }

    /// Presentation time of a frame: `index / fps`
    #[inline]
    pub fn frame_time(self, index: FrameIndex) -> MediaTime {
        MediaTime::from_secs_f64(index.0 as f64 / self.0)
    }

    /// Index of the frame being shown at `t`
    pub fn frame_at(self, t: MediaTime) -> FrameIndex {
        let idx = (t.as_secs_f64() * self.0).floor().max(0.0);
        FrameIndex(idx as u32)
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate::PAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_time_conversions() {
        let t = MediaTime::from_secs_f64(1.25);
        assert_eq!(t.as_micros(), 1_250_000);
        assert_eq!(t.as_millis(), 1250);
        assert!((t.as_secs_f64() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_media_time_lerp() {
        let a = MediaTime::from_millis(1000);
        let b = MediaTime::from_millis(2000);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.2), MediaTime::from_millis(1200));
    }

    #[test]
    fn test_media_time_sub_saturates() {
        let a = MediaTime::from_millis(100);
        let b = MediaTime::from_millis(150);
        assert_eq!(b - a, Duration::from_millis(50));
        assert_eq!(a - b, Duration::ZERO);
    }

    #[test]
    fn test_frame_rate_rejects_invalid() {
        assert!(FrameRate::new(0.0).is_none());
        assert!(FrameRate::new(-25.0).is_none());
        assert!(FrameRate::new(f64::NAN).is_none());
        assert!(FrameRate::new(30.0).is_some());
    }

    #[test]
    fn test_frame_count_rounds() {
        let rate = FrameRate::PAL;
        assert_eq!(rate.frame_count(MediaTime::from_millis(1000)), 25);
        assert_eq!(rate.frame_count(MediaTime::from_millis(1019)), 25);
        assert_eq!(rate.frame_count(MediaTime::from_millis(1021)), 26);
        assert_eq!(rate.frame_count(MediaTime::ZERO), 0);
    }

    proptest::proptest! {
        #[test]
        fn prop_lerp_stays_in_span(start in 0i64..10_000_000, len in 0i64..10_000_000, ratio in 0.0f64..=1.0) {
            let a = MediaTime(start);
            let b = MediaTime(start + len);
            let t = a.lerp(b, ratio);
            proptest::prop_assert!(t >= a && t <= b);
        }
    }

    #[test]
    fn test_frame_time_roundtrip() {
        let rate = FrameRate::new(30.0).unwrap();
        for i in 0..300u32 {
            let t = rate.frame_time(FrameIndex(i));
            assert_eq!(rate.frame_at(t + Duration::from_micros(1)), FrameIndex(i));
        }
    }
}
