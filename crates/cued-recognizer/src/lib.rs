//! CUED Recognizer - phonemes from cue video features
//!
//! Used when no transcript is available. Three bidirectional GRU encoders
//! read the hand-shape, hand-position and lip feature streams; their outputs
//! are concatenated and fused by a fourth bidirectional GRU, then projected
//! to per-frame logits over the phoneme vocabulary.
//!
//! - [`Recognizer::infer`] is stateless: every clip starts from zero hidden
//!   state, and the recognizer can be shared across threads behind an `Arc`.
//! - [`GreedyCtcDecoder`] collapses logits into phoneme tokens.
//! - [`export`] writes a portable graph and converts it to the edge format.

pub mod config;
pub mod decode;
pub mod export;
pub mod features;
pub mod gru;
pub mod model;
pub mod vocab;
pub mod weights;

pub use config::*;
pub use decode::*;
pub use features::*;
pub use gru::*;
pub use model::*;
pub use vocab::*;
pub use weights::*;
