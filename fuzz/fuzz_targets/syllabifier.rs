#![no_main]

use cued_phonetics::{syllabify, CueMapper};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    let syllables = syllabify(text);

    // Units cover the input exactly, minus whitespace
    let joined: String = syllables.iter().map(|s| s.text.as_str()).collect();
    let expected: String = text.split_whitespace().collect();
    assert_eq!(joined, expected);

    let mappings = CueMapper::lpc().map_all(&syllables);
    assert_eq!(mappings.len(), syllables.len());
});
