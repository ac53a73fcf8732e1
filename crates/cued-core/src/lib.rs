//! CUED Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the cue pipeline:
//! - Identifiers (FrameIndex, SyllableIndex)
//! - Time primitives (MediaTime, FrameRate)
//! - LPC cue vocabulary (HandShape, HandPosition, CueTarget)
//! - Phoneme tokens
//! - The error taxonomy shared by every stage

pub mod cue;
pub mod error;
pub mod id;
pub mod phoneme;
pub mod time;

pub use cue::*;
pub use error::*;
pub use id::*;
pub use phoneme::*;
pub use time::*;
