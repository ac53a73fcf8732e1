#![no_main]

use arbitrary::Arbitrary;
use cued_core::MediaTime;
use cued_phonetics::syllabify;
use cued_time::{Alignment, Interval, TimingResolver};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    ipa: String,
    total_ms: i32,
    phones: bool,
    intervals: Vec<(i32, i32)>,
}

fuzz_target!(|input: Input| {
    let syllables = syllabify(&input.ipa);
    let total = MediaTime::from_millis(input.total_ms as i64);
    let intervals: Vec<Interval> = input
        .intervals
        .iter()
        .map(|&(s, e)| Interval::new(MediaTime::from_millis(s as i64), MediaTime::from_millis(e as i64), ""))
        .collect();
    let alignment = if input.phones {
        Alignment::Phones(intervals)
    } else {
        Alignment::Words(intervals)
    };

    let resolver = TimingResolver::default();
    match resolver.resolve(&syllables, total, Some(&alignment)) {
        Ok(timing) => {
            // Whatever the alignment, the result is usable
            assert!(total.is_positive());
            assert_eq!(timing.len(), syllables.len());
            assert!(timing.is_consistent());
        }
        Err(e) => {
            assert!(!total.is_positive());
            assert_eq!(e.condition(), "timing_unavailable");
        }
    }
});
