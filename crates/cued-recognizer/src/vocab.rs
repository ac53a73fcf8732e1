//! Phoneme vocabulary
//!
//! Ids 0..5 are reserved for the special tokens, `<BLANK>` (the CTC blank)
//! always at 0. Phonemes follow in first-seen order.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use cued_core::{CueError, CueResult};
use tracing::debug;

pub const BLANK: &str = "<BLANK>";
pub const UNK: &str = "<UNK>";
pub const SOS: &str = "<SOS>";
pub const EOS: &str = "<EOS>";
pub const PAD: &str = "<PAD>";

/// Special tokens in id order
pub const SPECIAL_TOKENS: [&str; 5] = [BLANK, UNK, SOS, EOS, PAD];

/// Immutable symbol <-> id table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyTable {
    symbols: Vec<String>,
    ids: HashMap<String, u32>,
}

impl VocabularyTable {
    pub const BLANK_ID: u32 = 0;
    pub const UNK_ID: u32 = 1;

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn id(&self, symbol: &str) -> Option<u32> {
        self.ids.get(symbol).copied()
    }

    /// Id of `symbol`, `<UNK>` when absent
    pub fn id_or_unk(&self, symbol: &str) -> u32 {
        self.id(symbol).unwrap_or(Self::UNK_ID)
    }

    pub fn symbol(&self, id: u32) -> Option<&str> {
        self.symbols.get(id as usize).map(String::as_str)
    }

    pub fn is_special(&self, id: u32) -> bool {
        (id as usize) < SPECIAL_TOKENS.len()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Phoneme symbols only, in id order
    pub fn phonemes(&self) -> &[String] {
        &self.symbols[SPECIAL_TOKENS.len()..]
    }

    /// Build from the first column of a CSV file with a header row
    pub fn from_csv_path(path: impl AsRef<Path>) -> CueResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            CueError::RecognizerLoadFailure(format!("vocabulary {}: {}", path.display(), e))
        })?;
        let table = Self::from_csv_reader(file).map_err(|e| {
            CueError::RecognizerLoadFailure(format!("vocabulary {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), size = table.len(), "loaded vocabulary");
        Ok(table)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, String> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut builder = VocabularyBuilder::new();
        for record in rdr.records() {
            let record = record.map_err(|e| e.to_string())?;
            if let Some(symbol) = record.get(0) {
                builder.push(symbol);
            }
        }
        Ok(builder.build())
    }
}

/// Deterministic vocabulary construction.
///
/// Specials found in the source are dropped, the rest are de-duplicated
/// keeping first occurrence, then the five specials are placed at ids 0..5.
#[derive(Debug, Default, Clone)]
pub struct VocabularyBuilder {
    seen: Vec<String>,
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: &str) -> &mut Self {
        let symbol = symbol.trim();
        if !symbol.is_empty()
            && !SPECIAL_TOKENS.contains(&symbol)
            && !self.seen.iter().any(|s| s == symbol)
        {
            self.seen.push(symbol.to_string());
        }
        self
    }

    pub fn extend<I, S>(&mut self, symbols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for s in symbols {
            self.push(s.as_ref());
        }
        self
    }

    pub fn build(&self) -> VocabularyTable {
        let symbols: Vec<String> = SPECIAL_TOKENS
            .iter()
            .map(|s| s.to_string())
            .chain(self.seen.iter().cloned())
            .collect();
        let ids = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        VocabularyTable { symbols, ids }
    }
}
