//! CUED Visual - Cue animation synthesis
//!
//! Turns timed cue keyframes into a per-frame hand landmark trajectory.
//! This is NOT a renderer. The output is landmark STATE per frame, which an
//! external compositor rasterizes onto the source video.
//!
//! # Pipeline per frame
//!
//! 1. Locate the frame in the keyframe timeline (hold or transition)
//! 2. Ease the transition progress
//! 3. Interpolate the anchor point (straight or curved path)
//! 4. Interpolate the hand shape (hard cut or morph)
//! 5. Compute opacity (constant or fade-through)
//! 6. Scale the template to the current face and anchor it
//!
//! With every optional feature disabled the result is the minimal baseline:
//! straight path, cut at the window midpoint, opaque hand.

pub mod easing;
pub mod face;
pub mod geometry;
pub mod handshape;
pub mod keyframe;
pub mod position;
pub mod synthesis;
pub mod trajectory;

pub use easing::*;
pub use face::*;
pub use geometry::*;
pub use handshape::*;
pub use keyframe::*;
pub use position::*;
pub use synthesis::*;
pub use trajectory::*;
