//! Phase Timing Resolver
//!
//! Turns syllable units and a clip duration into per-syllable anchors. An
//! alignment that fails validation is not an error for the caller: the
//! resolver logs it and falls back to a proportional split.

use cued_core::{CueError, CueResult, MediaTime};
use cued_phonetics::SyllableUnit;
use tracing::{debug, warn};

use crate::{Alignment, FallbackReason, Interval, PhaseRatios, TimingAnchors, TimingResolution};

/// Syllable span `[start, end]`
type Span = (MediaTime, MediaTime);

/// Timing resolver configured with fixed phase ratios
#[derive(Clone, Debug, Default)]
pub struct TimingResolver {
    ratios: PhaseRatios,
}

impl TimingResolver {
    /// Create a resolver; rejects invalid ratios
    pub fn new(ratios: PhaseRatios) -> CueResult<Self> {
        ratios.validate()?;
        Ok(TimingResolver { ratios })
    }

    pub fn ratios(&self) -> &PhaseRatios {
        &self.ratios
    }

    /// Resolve anchors for every syllable
    pub fn resolve(
        &self,
        syllables: &[SyllableUnit],
        total: MediaTime,
        alignment: Option<&Alignment>,
    ) -> CueResult<TimingResolution> {
        if !total.is_positive() {
            return Err(CueError::TimingUnavailable(total));
        }

        let reason = match alignment {
            Some(alignment) => match aligned_spans(syllables, total, alignment) {
                Ok(spans) => {
                    debug!(
                        syllables = syllables.len(),
                        level = alignment.level(),
                        "timing from alignment"
                    );
                    return Ok(TimingResolution::Aligned(self.place(&spans)));
                }
                Err(err) => {
                    warn!(%err, "alignment rejected, using proportional timing");
                    FallbackReason::InvalidAlignment(err.to_string())
                }
            },
            None => FallbackReason::NoAlignment,
        };

        if !syllables.is_empty() {
            warn!(
                syllables = syllables.len(),
                duration = ?total,
                %reason,
                "degraded timing: proportional fallback"
            );
        }

        let weights: Vec<u64> = syllables.iter().map(weight).collect();
        let spans = proportional_spans(MediaTime::ZERO, total, &weights);

        Ok(TimingResolution::Fallback {
            anchors: self.place(&spans),
            reason,
        })
    }

    fn place(&self, spans: &[Span]) -> Vec<TimingAnchors> {
        spans
            .iter()
            .map(|&(start, end)| TimingAnchors::from_span(start, end, &self.ratios))
            .collect()
    }
}

/// Weight of a syllable in proportional splits: its character length
fn weight(syllable: &SyllableUnit) -> u64 {
    syllable.char_len().max(1) as u64
}

/// Split `[start, end]` into consecutive spans proportional to `weights`.
///
/// Boundaries are cumulative integer microseconds so the last span ends
/// exactly at `end` and no span overlaps its neighbour.
pub fn proportional_spans(start: MediaTime, end: MediaTime, weights: &[u64]) -> Vec<Span> {
    let total_weight: u64 = weights.iter().sum();
    if weights.is_empty() || total_weight == 0 {
        return Vec::new();
    }

    let length = i128::from((end.as_micros() - start.as_micros()).max(0));
    let mut spans = Vec::with_capacity(weights.len());
    let mut cumulative = 0u64;
    let mut prev = start;

    for &w in weights {
        cumulative += w;
        let offset = length * i128::from(cumulative) / i128::from(total_weight);
        let boundary = MediaTime::from_micros(start.as_micros() + offset as i64);
        spans.push((prev, boundary));
        prev = boundary;
    }

    spans
}

fn aligned_spans(
    syllables: &[SyllableUnit],
    total: MediaTime,
    alignment: &Alignment,
) -> CueResult<Vec<Span>> {
    alignment.validate(total)?;
    match alignment {
        Alignment::Phones(phones) => phone_spans(syllables, phones),
        Alignment::Words(words) => word_spans(syllables, words),
    }
}

/// Each syllable spans from its first to its last phone
fn phone_spans(syllables: &[SyllableUnit], phones: &[Interval]) -> CueResult<Vec<Span>> {
    let expected: usize = syllables.iter().map(|s| s.segments().len()).sum();
    if expected != phones.len() {
        return Err(CueError::AlignmentUnavailable(format!(
            "expected {} phone intervals, got {}",
            expected,
            phones.len()
        )));
    }

    let mut spans = Vec::with_capacity(syllables.len());
    let mut cursor = 0;
    let mut last_end = MediaTime::ZERO;

    for syllable in syllables {
        let n = syllable.segments().len();
        let own = &phones[cursor..cursor + n];
        let span = match (own.first(), own.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => (last_end, last_end),
        };
        last_end = span.1;
        cursor += n;
        spans.push(span);
    }

    Ok(spans)
}

/// Each word span is split among its syllables by character length
fn word_spans(syllables: &[SyllableUnit], words: &[Interval]) -> CueResult<Vec<Span>> {
    let groups = word_groups(syllables);
    if groups.len() != words.len() {
        return Err(CueError::AlignmentUnavailable(format!(
            "expected {} word intervals, got {}",
            groups.len(),
            words.len()
        )));
    }

    let mut spans = Vec::with_capacity(syllables.len());
    for (group, word) in groups.iter().zip(words) {
        let weights: Vec<u64> = group.iter().map(weight).collect();
        spans.extend(proportional_spans(word.start, word.end, &weights));
    }
    Ok(spans)
}

/// Consecutive runs of syllables sharing a word index
fn word_groups(syllables: &[SyllableUnit]) -> Vec<&[SyllableUnit]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=syllables.len() {
        if i == syllables.len() || syllables[i].word_index != syllables[start].word_index {
            groups.push(&syllables[start..i]);
            start = i;
        }
    }
    groups
}
