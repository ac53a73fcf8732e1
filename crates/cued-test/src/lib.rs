//! CUED Test Harness - End-to-end validation
//!
//! This crate provides:
//! - A small French corpus with matching alignments
//! - Synthetic landmarks, face tracks and recognizer files
//! - An integration harness that checks trajectory invariants
//! - A timing fuzzer for alignments, valid and corrupted

pub mod corpus;
pub mod fixtures;
pub mod integration;
pub mod timing_fuzzer;

pub use corpus::*;
pub use fixtures::*;
pub use integration::*;
pub use timing_fuzzer::*;
