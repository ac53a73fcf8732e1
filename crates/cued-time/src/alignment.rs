//! External alignment input
//!
//! Produced by a forced aligner. Intervals are either one per phone (segment)
//! or one per word, in source order.

use cued_core::{CueError, CueResult, MediaTime};
use serde::{Deserialize, Serialize};

/// One aligned interval
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: MediaTime,
    pub end: MediaTime,
    /// Phone or word label as reported by the aligner
    #[serde(default)]
    pub label: String,
}

impl Interval {
    pub fn new(start: MediaTime, end: MediaTime, label: impl Into<String>) -> Self {
        Interval {
            start,
            end,
            label: label.into(),
        }
    }
}

/// Alignment at phone or word granularity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "intervals", rename_all = "snake_case")]
pub enum Alignment {
    /// One interval per IPA segment, consumed sequentially
    Phones(Vec<Interval>),
    /// One interval per whitespace-separated word
    Words(Vec<Interval>),
}

impl Alignment {
    pub fn intervals(&self) -> &[Interval] {
        match self {
            Alignment::Phones(intervals) | Alignment::Words(intervals) => intervals,
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            Alignment::Phones(_) => "phones",
            Alignment::Words(_) => "words",
        }
    }

    /// Intervals must be well-formed, ordered, non-overlapping and inside
    /// `[0, total]`.
    pub fn validate(&self, total: MediaTime) -> CueResult<()> {
        let intervals = self.intervals();
        for (idx, iv) in intervals.iter().enumerate() {
            if iv.start < MediaTime::ZERO || iv.end < iv.start {
                return Err(CueError::AlignmentUnavailable(format!(
                    "{} interval {} is malformed: {:?}..{:?}",
                    self.level(),
                    idx,
                    iv.start,
                    iv.end
                )));
            }
            if iv.end > total {
                return Err(CueError::AlignmentUnavailable(format!(
                    "{} interval {} ends at {:?}, past the clip end {:?}",
                    self.level(),
                    idx,
                    iv.end,
                    total
                )));
            }
        }
        if let Some(idx) = intervals.windows(2).position(|w| w[1].start < w[0].end) {
            return Err(CueError::AlignmentUnavailable(format!(
                "{} intervals {} and {} overlap or are out of order",
                self.level(),
                idx,
                idx + 1
            )));
        }
        Ok(())
    }
}
