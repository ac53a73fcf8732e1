//! Phoneme tokens as produced by transcription or recognition

use serde::{Deserialize, Serialize};

/// A single phoneme hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeToken {
    /// IPA grapheme, e.g. "ɑ̃"
    pub symbol: String,
    /// Source confidence [0.0 - 1.0]
    pub confidence: f32,
}

impl PhonemeToken {
    pub fn new(symbol: impl Into<String>, confidence: f32) -> Self {
        Self {
            symbol: symbol.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Token from a transcript, where every symbol is taken as certain
    pub fn certain(symbol: impl Into<String>) -> Self {
        Self::new(symbol, 1.0)
    }
}

/// Join phoneme tokens into an IPA string, separating words with `word_separator`
///
/// Tokens equal to the separator become spaces so the syllabifier sees word
/// boundaries.
pub fn tokens_to_ipa(tokens: &[PhonemeToken], word_separator: &str) -> String {
    let mut ipa = String::new();
    for token in tokens {
        if token.symbol == word_separator {
            if !ipa.is_empty() && !ipa.ends_with(' ') {
                ipa.push(' ');
            }
        } else {
            ipa.push_str(&token.symbol);
        }
    }
    ipa.trim_end().to_string()
}
