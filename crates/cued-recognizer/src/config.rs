//! Recognizer configuration

use cued_core::{CueError, CueResult};
use serde::{Deserialize, Serialize};

/// Per-stream dimensions and layer sizes, fixed at construction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Hand-shape features per frame
    pub hand_shape_dim: usize,
    /// Hand-position features per frame
    pub hand_pos_dim: usize,
    /// Lip features per frame
    pub lips_dim: usize,
    /// Hidden size H of each stream encoder
    pub hidden_size: usize,
    /// Stacked layers per GRU
    pub num_layers: usize,
    /// Output classes, specials included
    pub vocab_size: usize,
}

impl RecognizerConfig {
    /// Production layout: 7/18/8 features, H = 128, two layers
    pub fn new(vocab_size: usize) -> Self {
        RecognizerConfig {
            hand_shape_dim: 7,
            hand_pos_dim: 18,
            lips_dim: 8,
            hidden_size: 128,
            num_layers: 2,
            vocab_size,
        }
    }

    /// Small layout for tests and benchmarks
    pub fn tiny(vocab_size: usize) -> Self {
        RecognizerConfig {
            hidden_size: 8,
            num_layers: 1,
            ..Self::new(vocab_size)
        }
    }

    /// Encoder stream dimensions in (hand_shape, hand_pos, lips) order
    pub fn stream_dims(&self) -> [usize; 3] {
        [self.hand_shape_dim, self.hand_pos_dim, self.lips_dim]
    }

    /// Concatenated encoder output width, 6H
    pub fn fusion_input(&self) -> usize {
        6 * self.hidden_size
    }

    /// Fusion GRU hidden size, 3H
    pub fn fusion_hidden(&self) -> usize {
        3 * self.hidden_size
    }

    /// Fusion output width fed to the projection, 6H
    pub fn projection_input(&self) -> usize {
        2 * self.fusion_hidden()
    }

    pub fn validate(&self) -> CueResult<()> {
        let dims = [
            ("hand_shape_dim", self.hand_shape_dim),
            ("hand_pos_dim", self.hand_pos_dim),
            ("lips_dim", self.lips_dim),
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
        ];
        if let Some((name, _)) = dims.iter().find(|(_, v)| *v == 0) {
            return Err(CueError::InvalidConfig(format!("{} must be positive", name)));
        }
        if self.vocab_size <= crate::SPECIAL_TOKENS.len() {
            return Err(CueError::InvalidConfig(format!(
                "vocab_size {} leaves no phoneme classes",
                self.vocab_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_sizes() {
        let config = RecognizerConfig::new(40);
        assert_eq!(config.stream_dims(), [7, 18, 8]);
        assert_eq!(config.fusion_input(), 768);
        assert_eq!(config.fusion_hidden(), 384);
        assert_eq!(config.projection_input(), 768);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid() {
        assert!(RecognizerConfig::new(5).validate().is_err());
        let config = RecognizerConfig {
            hidden_size: 0,
            ..RecognizerConfig::new(40)
        };
        assert!(config.validate().is_err());
    }
}
