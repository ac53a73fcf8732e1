#![no_main]

use cued_recognizer::{VocabularyTable, WeightStore};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed files are errors, never panics
    let _ = WeightStore::from_bytes(data);

    if let Ok(vocab) = VocabularyTable::from_csv_reader(data) {
        assert!(vocab.len() >= 5);
        assert_eq!(vocab.id("<BLANK>"), Some(0));
    }
});
