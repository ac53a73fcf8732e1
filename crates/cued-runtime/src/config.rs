//! Pipeline configuration
//!
//! Every section has defaults, so a TOML file only lists what it changes:
//!
//! ```toml
//! frame_rate = 30.0
//!
//! [synthesis.style]
//! easing = "ease_out_elastic"
//! transparency = false
//!
//! [batch]
//! mode = "sequential"
//!
//! [logging]
//! level = "debug"
//! json = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use cued_core::{CueError, CueResult, FrameRate};
use cued_time::PhaseRatios;
use cued_visual::SynthesisConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::LoggingConfig;

/// How a batch schedules its items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Bounded worker pool
    #[default]
    Parallel,
    /// One item at a time with a pause in between
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub mode: BatchMode,
    /// Items processed at once in parallel mode
    pub max_concurrent: usize,
    /// Per-item limit; none when unset
    pub item_timeout_ms: Option<u64>,
    /// Pause between items in sequential mode
    pub sequential_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            mode: BatchMode::Parallel,
            max_concurrent: 4,
            item_timeout_ms: None,
            sequential_delay_ms: 1000,
        }
    }
}

impl BatchConfig {
    pub fn sequential() -> Self {
        BatchConfig {
            mode: BatchMode::Sequential,
            ..Self::default()
        }
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    pub fn sequential_delay(&self) -> Duration {
        Duration::from_millis(self.sequential_delay_ms)
    }

    pub fn validate(&self) -> CueResult<()> {
        if self.max_concurrent == 0 {
            return Err(CueError::InvalidConfig("batch.max_concurrent must be at least 1".into()));
        }
        if self.item_timeout_ms == Some(0) {
            return Err(CueError::InvalidConfig("batch.item_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Trained recognizer files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecognizerFiles {
    pub weights: PathBuf,
    pub vocabulary: PathBuf,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,
}

fn default_hidden_size() -> usize {
    128
}

fn default_num_layers() -> usize {
    2
}

/// Whole-pipeline configuration, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Output frames per second
    pub frame_rate: f64,
    pub timing: PhaseRatios,
    pub synthesis: SynthesisConfig,
    /// Directory of `handshape_<n>.csv` templates; built-in shapes when unset
    pub handshapes_dir: Option<PathBuf>,
    /// Recognizer for jobs without a transcript
    pub recognizer: Option<RecognizerFiles>,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            frame_rate: FrameRate::PAL.fps(),
            timing: PhaseRatios::default(),
            synthesis: SynthesisConfig::default(),
            handshapes_dir: None,
            recognizer: None,
            batch: BatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Straight path, midpoint cut, opaque hand
    pub fn baseline() -> Self {
        PipelineConfig {
            synthesis: SynthesisConfig::baseline(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> CueResult<Self> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| CueError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> CueResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CueError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> CueResult<String> {
        toml::to_string(self).map_err(|e| CueError::Serialization(e.to_string()))
    }

    pub fn frame_rate(&self) -> CueResult<FrameRate> {
        FrameRate::new(self.frame_rate).ok_or_else(|| {
            CueError::InvalidConfig(format!("frame_rate must be positive, got {}", self.frame_rate))
        })
    }

    pub fn validate(&self) -> CueResult<()> {
        self.frame_rate()?;
        self.timing.validate()?;
        self.synthesis.validate()?;
        self.batch.validate()?;
        self.logging.validate()?;
        if let Some(files) = &self.recognizer {
            if files.hidden_size == 0 || files.num_layers == 0 {
                return Err(CueError::InvalidConfig(
                    "recognizer hidden_size and num_layers must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}
