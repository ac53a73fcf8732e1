//! The multi-stream recognizer

use std::path::Path;

use cued_core::{CueError, CueResult};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::{debug, info};

use crate::{BiGru, FeatureStreams, RecognizerConfig, WeightStore};

/// Stream encoder names, in (hand_shape, hand_pos, lips) order
pub const ENCODER_NAMES: [&str; 3] = ["hand_shape_gru", "hand_pos_gru", "lips_gru"];
pub const FUSION_NAME: &str = "fusion_gru";
pub const PROJECTION_WEIGHT: &str = "ctc_fc.weight";
pub const PROJECTION_BIAS: &str = "ctc_fc.bias";

/// Per-frame class scores `[T × V]`
#[derive(Debug, Clone, PartialEq)]
pub struct Logits(Array2<f32>);

impl Logits {
    pub fn new(values: Array2<f32>) -> Self {
        Self(values)
    }

    pub fn frames(&self) -> usize {
        self.0.nrows()
    }

    pub fn classes(&self) -> usize {
        self.0.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }

    pub fn frame(&self, t: usize) -> ArrayView1<'_, f32> {
        self.0.row(t)
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.0
    }
}

/// Initial hidden state of every recurrent layer, `[2L × H]` per GRU
#[derive(Debug, Clone, PartialEq)]
pub struct InitialStates {
    pub encoders: [Array2<f32>; 3],
    pub fusion: Array2<f32>,
}

/// Final linear layer
#[derive(Debug, Clone)]
pub struct Projection {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

/// Loaded recognizer. Read-only after construction.
#[derive(Debug, Clone)]
pub struct Recognizer {
    config: RecognizerConfig,
    encoders: [BiGru; 3],
    fusion: BiGru,
    projection: Projection,
}

impl Recognizer {
    pub fn from_weights(config: RecognizerConfig, store: &WeightStore) -> CueResult<Self> {
        config.validate()?;
        let [shape_dim, pos_dim, lips_dim] = config.stream_dims();
        let (h, layers) = (config.hidden_size, config.num_layers);

        let encoders = [
            BiGru::load(store, ENCODER_NAMES[0], shape_dim, h, layers)?,
            BiGru::load(store, ENCODER_NAMES[1], pos_dim, h, layers)?,
            BiGru::load(store, ENCODER_NAMES[2], lips_dim, h, layers)?,
        ];
        let fusion = BiGru::load(store, FUSION_NAME, config.fusion_input(), config.fusion_hidden(), layers)?;
        let projection = Projection {
            weight: store.matrix(PROJECTION_WEIGHT, (config.vocab_size, config.projection_input()))?,
            bias: store.vector(PROJECTION_BIAS, config.vocab_size)?,
        };

        debug!(
            hidden = h,
            layers,
            vocab = config.vocab_size,
            "recognizer ready"
        );
        Ok(Self {
            config,
            encoders,
            fusion,
            projection,
        })
    }

    /// Load weights from a safetensors file
    pub fn load(config: RecognizerConfig, weights: impl AsRef<Path>) -> CueResult<Self> {
        let path = weights.as_ref();
        let store = WeightStore::load(path)?;
        let recognizer = Self::from_weights(config, &store)?;
        info!(path = %path.display(), "loaded recognizer");
        Ok(recognizer)
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    pub fn encoders(&self) -> &[BiGru; 3] {
        &self.encoders
    }

    pub fn fusion(&self) -> &BiGru {
        &self.fusion
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn zero_states(&self) -> InitialStates {
        InitialStates {
            encoders: [
                self.encoders[0].zero_state(),
                self.encoders[1].zero_state(),
                self.encoders[2].zero_state(),
            ],
            fusion: self.fusion.zero_state(),
        }
    }

    /// Logits for one clip. Every clip starts from zero state.
    pub fn infer(&self, streams: &FeatureStreams) -> CueResult<Logits> {
        self.forward_with_states(streams, &self.zero_states())
    }

    /// Forward pass seeded with explicit initial states
    pub fn forward_with_states(&self, streams: &FeatureStreams, states: &InitialStates) -> CueResult<Logits> {
        streams.check(&self.config)?;

        let encoded = self
            .encoders
            .iter()
            .zip(streams.streams())
            .zip(states.encoders.iter())
            .map(|((gru, input), h0)| gru.forward_with_state(input, h0.view()))
            .collect::<CueResult<Vec<_>>>()?;

        let views: Vec<_> = encoded.iter().map(|e| e.view()).collect();
        let combined =
            concatenate(Axis(1), &views).map_err(|e| CueError::FeatureMismatch(e.to_string()))?;
        let fused = self.fusion.forward_with_state(combined.view(), states.fusion.view())?;

        let logits = fused.dot(&self.projection.weight.t()) + &self.projection.bias;
        debug!(frames = logits.nrows(), "inferred logits");
        Ok(Logits(logits))
    }
}
