//! CUED Runtime
//!
//! Ties the stages together. A [`Pipeline`] turns one [`VideoJob`] into a
//! hand trajectory:
//!
//! ```text
//! source -> phonemes -> syllables -> cue targets -> keyframes -> frames
//! ```
//!
//! Phonemes come from a transcript, or from the recognizer when the job
//! carries feature streams or landmarks. A [`BatchRunner`] runs many jobs
//! over one shared pipeline with a bounded worker pool.

pub mod batch;
pub mod config;
pub mod logging;
pub mod pipeline;

pub use batch::*;
pub use config::*;
pub use logging::LoggingConfig;
pub use pipeline::*;
