//! Error types for the cue pipeline

use thiserror::Error;

use crate::MediaTime;

/// Core pipeline errors
#[derive(Error, Debug)]
pub enum CueError {
    // Input errors
    #[error("Input missing: {0}")]
    InputMissing(String),

    #[error("Timing unavailable: total duration {0:?} is not positive")]
    TimingUnavailable(MediaTime),

    // Locally recovered conditions
    #[error("Alignment unavailable: {0}")]
    AlignmentUnavailable(String),

    #[error("Unknown phoneme: {0}")]
    UnknownPhoneme(String),

    // Recognizer errors
    #[error("Recognizer load failure: {0}")]
    RecognizerLoadFailure(String),

    #[error("Feature stream mismatch: {0}")]
    FeatureMismatch(String),

    // Export errors
    #[error("Export toolchain failure: {0}")]
    ExportToolchainFailure(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Runtime errors
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CueError {
    /// Conditions the stage that raised them compensates for itself.
    /// They never unwind past the timing resolver or the cue mapper.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CueError::AlignmentUnavailable(_) | CueError::UnknownPhoneme(_)
        )
    }

    /// Short machine-friendly name of the condition, used in batch reports
    pub fn condition(&self) -> &'static str {
        match self {
            CueError::InputMissing(_) => "input_missing",
            CueError::TimingUnavailable(_) => "timing_unavailable",
            CueError::AlignmentUnavailable(_) => "alignment_unavailable",
            CueError::UnknownPhoneme(_) => "unknown_phoneme",
            CueError::RecognizerLoadFailure(_) => "recognizer_load_failure",
            CueError::FeatureMismatch(_) => "feature_mismatch",
            CueError::ExportToolchainFailure(_) => "export_toolchain_failure",
            CueError::InvalidConfig(_) => "invalid_config",
            CueError::Cancelled(_) => "cancelled",
            CueError::Serialization(_) => "serialization",
            CueError::Io(_) => "io",
        }
    }
}

/// Result type for cue pipeline operations
pub type CueResult<T> = Result<T, CueError>;
