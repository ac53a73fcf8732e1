//! Animation Synthesizer
//!
//! For consecutive keyframes `(k_i, k_{i+1})` the transition window is
//! `[max(k_i.a3, k_{i+1}.m1), k_{i+1}.m2]`. Before the window the hand holds
//! `k_i`, after it `k_{i+1}`. Inside, progress `p` runs from 0 to 1 and drives
//! the path, shape and opacity strategies. Each transition follows the style
//! carried by the keyframe it moves into; the configuration only supplies the
//! curve offset and the fade floor.

use cued_core::{CueError, CueResult, FrameIndex, FrameRate, HandPosition, HandShape, MediaTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    curve_control, pointing_landmark, quadratic_bezier, AnimationFrame, CueKeyframe, Easing,
    FaceFrame, FaceTrack, HandLandmarks, HandShapeLibrary, Point3, PositionMap, Trajectory,
    TransitionStyle,
};

/// Synthesis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Style given to keyframes built for this synthesizer
    pub style: TransitionStyle,
    /// Hand size relative to the face
    pub hand_scale_factor: f32,
    /// Face height (normalized) at which templates have their native size
    pub reference_face_size: f32,
    /// Lowest opacity reached mid-transition when fading
    pub transparency_min_alpha: f32,
    /// Curve control offset as a fraction of the segment length
    pub curve_offset_ratio: f32,
    pub positions: PositionMap,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        SynthesisConfig {
            style: TransitionStyle::default(),
            hand_scale_factor: 0.75,
            reference_face_size: 0.3,
            transparency_min_alpha: 0.4,
            curve_offset_ratio: 0.25,
            positions: PositionMap::default(),
        }
    }
}

impl SynthesisConfig {
    /// Minimal baseline: straight path, midpoint cut, opaque hand
    pub fn baseline() -> Self {
        SynthesisConfig {
            style: TransitionStyle::baseline(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CueResult<()> {
        if !(self.hand_scale_factor.is_finite() && self.hand_scale_factor > 0.0) {
            return Err(CueError::InvalidConfig(format!(
                "hand_scale_factor must be positive, got {}",
                self.hand_scale_factor
            )));
        }
        if !(self.reference_face_size.is_finite() && self.reference_face_size > 0.0) {
            return Err(CueError::InvalidConfig(format!(
                "reference_face_size must be positive, got {}",
                self.reference_face_size
            )));
        }
        if !(0.0..=1.0).contains(&self.transparency_min_alpha) {
            return Err(CueError::InvalidConfig(format!(
                "transparency_min_alpha must be within [0, 1], got {}",
                self.transparency_min_alpha
            )));
        }
        if !self.curve_offset_ratio.is_finite() {
            return Err(CueError::InvalidConfig("curve_offset_ratio must be finite".into()));
        }
        Ok(())
    }
}

/// How the anchor point travels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathStrategy {
    Straight,
    /// Quadratic Bézier bowed away from the face centre
    Curved { offset_ratio: f32 },
}

/// How the hand shape changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeStrategy {
    /// Switch at the window midpoint
    Cut,
    /// Blend every landmark by the eased progress
    Morph,
}

/// How opacity evolves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpacityStrategy {
    Constant,
    /// 1 at both ends, `min_alpha` at the midpoint
    Fade { min_alpha: f32 },
}

impl PathStrategy {
    fn point(&self, src: &Point3, dst: &Point3, face_center: &Point3, e: f32) -> Point3 {
        match *self {
            PathStrategy::Straight => src.lerp(dst, e),
            PathStrategy::Curved { offset_ratio } => {
                let control = curve_control(src, dst, face_center, offset_ratio);
                quadratic_bezier(src, &control, dst, e)
            }
        }
    }
}

impl OpacityStrategy {
    fn alpha(&self, p: f32) -> f32 {
        match *self {
            OpacityStrategy::Constant => 1.0,
            OpacityStrategy::Fade { min_alpha } => {
                1.0 - (1.0 - min_alpha) * (1.0 - (2.0 * p - 1.0).abs())
            }
        }
    }
}

/// Strategies for one transition, resolved once per synthesis call
#[derive(Debug, Clone, Copy)]
struct Strategies {
    easing: Easing,
    path: PathStrategy,
    shape: ShapeStrategy,
    opacity: OpacityStrategy,
}

impl Strategies {
    fn new(style: &TransitionStyle, config: &SynthesisConfig) -> Self {
        Strategies {
            easing: style.easing,
            path: if style.curving {
                PathStrategy::Curved {
                    offset_ratio: config.curve_offset_ratio,
                }
            } else {
                PathStrategy::Straight
            },
            shape: if style.morphing {
                ShapeStrategy::Morph
            } else {
                ShapeStrategy::Cut
            },
            opacity: if style.transparency {
                OpacityStrategy::Fade {
                    min_alpha: config.transparency_min_alpha,
                }
            } else {
                OpacityStrategy::Constant
            },
        }
    }
}

/// Where a frame falls in the keyframe timeline
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Hold(usize),
    /// Transition from keyframe `from` to `from + 1` at progress `p`
    Transition { from: usize, p: f32 },
}

/// Transition window into keyframe `i + 1`
fn window(keyframes: &[CueKeyframe], i: usize) -> (MediaTime, MediaTime) {
    let end = keyframes[i + 1].anchors.m2;
    let start = keyframes[i].anchors.a3.max(keyframes[i + 1].anchors.m1).min(end);
    (start, end)
}

fn phase_at(keyframes: &[CueKeyframe], windows: &[(MediaTime, MediaTime)], t: MediaTime) -> Phase {
    // Last window that has started
    let started = windows.partition_point(|&(start, _)| start <= t);
    if started == 0 {
        return Phase::Hold(0);
    }
    let i = started - 1;
    let (start, end) = windows[i];
    if t >= end {
        return Phase::Hold((i + 1).min(keyframes.len() - 1));
    }
    let span = (end.as_micros() - start.as_micros()) as f64;
    let p = ((t.as_micros() - start.as_micros()) as f64 / span) as f32;
    Phase::Transition { from: i, p }
}

/// Animation synthesizer
#[derive(Debug, Clone)]
pub struct Synthesizer {
    config: SynthesisConfig,
    library: HandShapeLibrary,
}

impl Synthesizer {
    /// Synthesizer with the built-in hand shapes
    pub fn new(config: SynthesisConfig) -> CueResult<Self> {
        Self::with_library(config, HandShapeLibrary::builtin())
    }

    pub fn with_library(config: SynthesisConfig, library: HandShapeLibrary) -> CueResult<Self> {
        config.validate()?;
        Ok(Self { config, library })
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn library(&self) -> &HandShapeLibrary {
        &self.library
    }

    /// Synthesize one frame per `1 / fps` covering `[0, duration]`
    pub fn synthesize(
        &self,
        keyframes: &[CueKeyframe],
        faces: &FaceTrack,
        frame_rate: FrameRate,
        duration: MediaTime,
    ) -> CueResult<Trajectory> {
        if keyframes.is_empty() {
            return Err(CueError::InputMissing("no cue keyframes to animate".into()));
        }
        if !duration.is_positive() {
            return Err(CueError::TimingUnavailable(duration));
        }

        let windows: Vec<_> = (0..keyframes.len() - 1).map(|i| window(keyframes, i)).collect();
        // Transition i moves into keyframe i + 1
        let strategies: Vec<Strategies> = keyframes[1..]
            .iter()
            .map(|kf| Strategies::new(&kf.style, &self.config))
            .collect();
        let count = frame_rate.frame_count(duration);

        debug!(
            keyframes = keyframes.len(),
            frames = count,
            fps = frame_rate.fps(),
            "synthesizing cue trajectory"
        );

        let frames = (0..count)
            .map(|i| {
                let index = FrameIndex::new(i as u32);
                let timestamp = frame_rate.frame_time(index);
                let face = faces.frame_at(index);
                let phase = phase_at(keyframes, &windows, timestamp);
                self.frame(index, timestamp, face, keyframes, phase, &strategies)
            })
            .collect();

        Ok(Trajectory::new(frame_rate, duration, frames))
    }

    fn scale(&self, face: &FaceFrame) -> f32 {
        self.config.hand_scale_factor * face.bbox.height / self.config.reference_face_size
    }

    fn frame(
        &self,
        index: FrameIndex,
        timestamp: MediaTime,
        face: &FaceFrame,
        keyframes: &[CueKeyframe],
        phase: Phase,
        strategies: &[Strategies],
    ) -> AnimationFrame {
        let positions = &self.config.positions;
        let scale = self.scale(face);

        match phase {
            Phase::Hold(k) => {
                let kf = &keyframes[k];
                let anchor = positions.target(kf.position, face);
                let template = self.library.template(kf.shape);
                AnimationFrame {
                    index,
                    timestamp,
                    landmarks: template.scale_translate(scale, anchor),
                    alpha: 1.0,
                    shape: kf.shape,
                    position: kf.position,
                }
            }
            Phase::Transition { from, p } => {
                let src = &keyframes[from];
                let dst = &keyframes[from + 1];
                let strategies = &strategies[from];
                let e = strategies.easing.apply(p);
                let past_mid = p >= 0.5;

                let src_anchor = positions.target(src.position, face);
                let dst_anchor = positions.target(dst.position, face);
                let anchor = strategies
                    .path
                    .point(&src_anchor, &dst_anchor, &face.bbox.center(), e);

                let template: HandLandmarks = match strategies.shape {
                    ShapeStrategy::Cut => {
                        let shape = if past_mid { dst.shape } else { src.shape };
                        self.library.template(shape).clone()
                    }
                    ShapeStrategy::Morph => self
                        .library
                        .template(src.shape)
                        .lerp(self.library.template(dst.shape), e),
                };

                let (shape, position): (HandShape, HandPosition) = if past_mid {
                    (dst.shape, dst.position)
                } else {
                    (src.shape, src.position)
                };

                AnimationFrame {
                    index,
                    timestamp,
                    landmarks: template.scale_translate(scale, anchor),
                    alpha: strategies.opacity.alpha(p),
                    shape,
                    position,
                }
            }
        }
    }
}

/// Pointing landmark position of a frame, i.e. where the cue touches
pub fn contact_point(frame: &AnimationFrame) -> Point3 {
    frame.landmarks.get(pointing_landmark(frame.shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cued_core::{CueTarget, SyllableIndex};
    use cued_time::{PhaseRatios, TimingAnchors};
    use proptest::prelude::*;

    fn ms(v: i64) -> MediaTime {
        MediaTime::from_millis(v)
    }

    fn keyframe(i: u32, shape: HandShape, position: HandPosition, start: i64, end: i64) -> CueKeyframe {
        CueKeyframe::new(
            SyllableIndex::new(i),
            "",
            CueTarget::new(shape, position),
            TimingAnchors::from_span(ms(start), ms(end), &PhaseRatios::default()),
            TransitionStyle::default(),
        )
    }

    /// Two cues over one second: windows at [520, 760] ms
    fn two_cues() -> Vec<CueKeyframe> {
        vec![
            keyframe(0, HandShape::One, HandPosition::Side, 0, 400),
            keyframe(1, HandShape::Five, HandPosition::Mouth, 400, 1000),
        ]
    }

    /// `two_cues` with every keyframe carrying `style`
    fn styled(style: TransitionStyle) -> Vec<CueKeyframe> {
        two_cues()
            .into_iter()
            .map(|kf| CueKeyframe { style, ..kf })
            .collect()
    }

    fn face_track() -> FaceTrack {
        FaceTrack::constant(FaceFrame::from_box(crate::FaceBox::new(0.4, 0.2, 0.2, 0.3)))
    }

    #[test]
    fn test_no_keyframes() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let err = synth
            .synthesize(&[], &face_track(), FrameRate::PAL, ms(1000))
            .unwrap_err();
        assert_eq!(err.condition(), "input_missing");
    }

    #[test]
    fn test_frame_count_and_timestamps() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let traj = synth
            .synthesize(&two_cues(), &face_track(), FrameRate::PAL, ms(1000))
            .unwrap();

        assert_eq!(traj.len(), 25);
        assert!(traj.is_contiguous());
        assert_eq!(traj[0].timestamp, MediaTime::ZERO);
        for pair in traj.frames().windows(2) {
            assert_eq!(pair[1].timestamp.as_micros() - pair[0].timestamp.as_micros(), 40_000);
        }

        let odd = synth
            .synthesize(&two_cues(), &face_track(), FrameRate::PAL, ms(1030))
            .unwrap();
        assert_eq!(odd.len(), 26);
    }

    #[test]
    fn test_holds_outside_windows() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let traj = synth
            .synthesize(&two_cues(), &face_track(), FrameRate::PAL, ms(1000))
            .unwrap();

        // 0..520 ms holds the first cue, from 760 ms the second
        let first = &traj[5];
        assert_eq!(first.shape, HandShape::One);
        assert_eq!(first.alpha, 1.0);
        let last = &traj[24];
        assert_eq!(last.shape, HandShape::Five);
        assert_eq!(last.position, HandPosition::Mouth);
        assert_eq!(last.alpha, 1.0);

        let face = FaceFrame::from_box(crate::FaceBox::new(0.4, 0.2, 0.2, 0.3));
        let mouth = PositionMap::default().target(HandPosition::Mouth, &face);
        let contact = contact_point(last);
        assert!((contact.x - mouth.x).abs() < 1e-5);
        assert!((contact.y - mouth.y).abs() < 1e-5);
    }

    #[test]
    fn test_baseline_reduction_is_exact() {
        let synth = Synthesizer::new(SynthesisConfig::baseline()).unwrap();
        let keyframes = styled(TransitionStyle::baseline());
        let faces = face_track();
        let traj = synth
            .synthesize(&keyframes, &faces, FrameRate::PAL, ms(1000))
            .unwrap();

        let face = faces.frame_at(FrameIndex(0));
        let positions = PositionMap::default();
        let library = HandShapeLibrary::builtin();
        let scale = 0.75 * face.bbox.height / 0.3;
        let src = positions.target(HandPosition::Side, face);
        let dst = positions.target(HandPosition::Mouth, face);
        let (start, end) = (520_000i64, 760_000i64);

        for frame in traj.iter() {
            let t = frame.timestamp.as_micros();
            let (anchor, shape) = if t < start {
                (src, HandShape::One)
            } else if t >= end {
                (dst, HandShape::Five)
            } else {
                let p = ((t - start) as f64 / (end - start) as f64) as f32;
                let shape = if p >= 0.5 { HandShape::Five } else { HandShape::One };
                (src.lerp(&dst, p), shape)
            };
            let expected = library.template(shape).scale_translate(scale, anchor);
            assert_eq!(frame.landmarks, expected, "frame {}", frame.index);
            assert_eq!(frame.alpha, 1.0);
            assert_eq!(frame.shape, shape);
        }
    }

    #[test]
    fn test_transparency_dips_mid_transition() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let kfs = styled(TransitionStyle {
            transparency: true,
            ..TransitionStyle::baseline()
        });
        let traj = synth.synthesize(&kfs, &face_track(), FrameRate::PAL, ms(1000)).unwrap();

        // 640 ms is the window midpoint
        let mid = &traj[16];
        assert!((mid.alpha - 0.4).abs() < 1e-5);
        assert!(traj.iter().all(|f| f.alpha >= 0.4 - 1e-6 && f.alpha <= 1.0));
    }

    #[test]
    fn test_curving_bows_away_from_face() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let straight = styled(TransitionStyle::baseline());
        let curved = styled(TransitionStyle {
            curving: true,
            ..TransitionStyle::baseline()
        });

        let faces = face_track();
        let a = synth.synthesize(&straight, &faces, FrameRate::PAL, ms(1000)).unwrap();
        let b = synth.synthesize(&curved, &faces, FrameRate::PAL, ms(1000)).unwrap();

        let center = faces.frame_at(FrameIndex(0)).bbox.center();
        let da = contact_point(&a[15]).distance(&center);
        let db = contact_point(&b[15]).distance(&center);
        assert!(db > da);
        // Endpoints coincide
        assert_eq!(a[24].landmarks, b[24].landmarks);
        assert_eq!(a[0].landmarks, b[0].landmarks);
    }

    #[test]
    fn test_morphing_is_continuous() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let kfs = styled(TransitionStyle {
            morphing: true,
            ..TransitionStyle::baseline()
        });
        let traj = synth
            .synthesize(&kfs, &face_track(), FrameRate::new(100.0).unwrap(), ms(1000))
            .unwrap();

        // Wrist moves in small steps through the window, no jump at the midpoint
        for pair in traj.frames()[50..78].windows(2) {
            let step = pair[0].landmarks.points()[0].distance(&pair[1].landmarks.points()[0]);
            assert!(step < 0.02, "step {} at frame {}", step, pair[0].index);
        }
    }

    #[test]
    fn test_keyframe_style_overrides_config() {
        // Fading synthesizer, opaque keyframes
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let traj = synth
            .synthesize(&styled(TransitionStyle::baseline()), &face_track(), FrameRate::PAL, ms(1000))
            .unwrap();
        assert!(traj.iter().all(|f| f.alpha == 1.0));

        // Opaque synthesizer, fading keyframes
        let synth = Synthesizer::new(SynthesisConfig::baseline()).unwrap();
        let fading = styled(TransitionStyle {
            transparency: true,
            ..TransitionStyle::baseline()
        });
        let traj = synth.synthesize(&fading, &face_track(), FrameRate::PAL, ms(1000)).unwrap();
        assert!((traj[16].alpha - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_each_transition_uses_its_target_style() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let mut kfs = vec![
            keyframe(0, HandShape::One, HandPosition::Side, 0, 400),
            keyframe(1, HandShape::Five, HandPosition::Mouth, 400, 1000),
            keyframe(2, HandShape::Two, HandPosition::Chin, 1000, 2000),
        ];
        kfs[1].style = TransitionStyle::baseline();
        let traj = synth.synthesize(&kfs, &face_track(), FrameRate::PAL, ms(2000)).unwrap();

        // Into the second cue (520..760 ms) the hand stays opaque
        assert!(traj.frames()[13..19].iter().all(|f| f.alpha == 1.0));
        // Into the third cue (1200..1600 ms) it fades
        assert!(traj.frames()[31..40].iter().any(|f| f.alpha < 1.0));
    }

    #[test]
    fn test_scale_follows_face() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let small = FaceTrack::constant(FaceFrame::from_box(crate::FaceBox::new(0.4, 0.2, 0.1, 0.15)));
        let large = FaceTrack::constant(FaceFrame::from_box(crate::FaceBox::new(0.4, 0.2, 0.2, 0.3)));
        let kfs = vec![keyframe(0, HandShape::Five, HandPosition::Chin, 0, 1000)];

        let a = synth.synthesize(&kfs, &small, FrameRate::PAL, ms(200)).unwrap();
        let b = synth.synthesize(&kfs, &large, FrameRate::PAL, ms(200)).unwrap();

        let span = |f: &AnimationFrame| f.landmarks.get(crate::HandJoint::Wrist).distance(&contact_point(f));
        assert!((span(&b[0]) / span(&a[0]) - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_unknown_cue_renders_neutral() {
        let synth = Synthesizer::new(SynthesisConfig::baseline()).unwrap();
        let kfs = vec![keyframe(0, HandShape::Unknown, HandPosition::Unknown, 0, 1000)];
        let traj = synth.synthesize(&kfs, &face_track(), FrameRate::PAL, ms(400)).unwrap();
        assert_eq!(traj[0].shape, HandShape::Unknown);
        assert!(traj[0].landmarks.is_finite());
    }

    #[test]
    fn test_invalid_config() {
        let config = SynthesisConfig {
            reference_face_size: 0.0,
            ..SynthesisConfig::default()
        };
        assert!(Synthesizer::new(config).is_err());

        let config = SynthesisConfig {
            transparency_min_alpha: 1.5,
            ..SynthesisConfig::default()
        };
        assert!(Synthesizer::new(config).is_err());
    }

    #[test]
    fn test_trajectory_json_roundtrip() {
        let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
        let traj = synth
            .synthesize(&two_cues(), &face_track(), FrameRate::PAL, ms(200))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.json");
        traj.write_json(&path).unwrap();
        let loaded = Trajectory::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.len(), traj.len());
        assert_eq!(loaded.frame_rate, FrameRate::PAL);
    }

    proptest! {
        #[test]
        fn prop_frame_grid(duration_ms in 1i64..20_000, fps in prop::sample::select(vec![24.0f64, 25.0, 30.0, 50.0, 60.0])) {
            let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
            let rate = FrameRate::new(fps).unwrap();
            let duration = ms(duration_ms);
            let traj = synth.synthesize(&two_cues(), &face_track(), rate, duration).unwrap();

            let expected = (duration.as_secs_f64() * fps).round() as usize;
            prop_assert_eq!(traj.len(), expected);
            prop_assert!(traj.is_contiguous());
            if let Some(last) = traj.frames().last() {
                let covered = (last.index.0 as f64 + 1.0) / fps;
                prop_assert!((covered - duration.as_secs_f64()).abs() <= 0.5 / fps + 1e-9);
            }
        }

        #[test]
        fn prop_easing_endpoints_hold(easing in prop::sample::select(Easing::all().to_vec())) {
            let synth = Synthesizer::new(SynthesisConfig::default()).unwrap();
            let kfs = styled(TransitionStyle { easing, ..TransitionStyle::default() });
            let traj = synth.synthesize(&kfs, &face_track(), FrameRate::PAL, ms(1000)).unwrap();
            prop_assert!(traj.iter().all(|f| f.landmarks.is_finite()));
            prop_assert_eq!(traj[24].shape, HandShape::Five);
            prop_assert_eq!(traj[0].alpha, 1.0);
        }
    }
}
