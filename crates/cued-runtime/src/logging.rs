//! Logging setup
//!
//! Library crates only emit `tracing` events. The embedding process calls
//! [`init`] once; `RUST_LOG`, when set, overrides the configured level.

use cued_core::{CueError, CueResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `cued_time=debug,warn`
    pub level: String,
    /// One JSON object per event instead of human-readable lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".into(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> CueResult<()> {
        self.filter().map(|_| ())
    }

    fn filter(&self) -> CueResult<EnvFilter> {
        EnvFilter::try_new(&self.level)
            .map_err(|e| CueError::InvalidConfig(format!("logging.level '{}': {}", self.level, e)))
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> CueResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.filter()?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.with_target(true).try_init()
    };
    result.map_err(|e| CueError::InvalidConfig(format!("logging: {}", e)))
}
