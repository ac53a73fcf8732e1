//! Weight store - named f32 tensors backed by safetensors files

use std::collections::HashMap;
use std::path::Path;

use cued_core::{CueError, CueResult};
use half::f16;
use ndarray::{Array1, Array2, ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    gru_parameter_names, RecognizerConfig, ENCODER_NAMES, FUSION_NAME, PROJECTION_BIAS, PROJECTION_WEIGHT,
};

/// Storage precision of a weight file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    F32,
    F16,
}

/// Named tensors, always held as f32 in memory
#[derive(Debug, Clone, Default)]
pub struct WeightStore {
    tensors: HashMap<String, ArrayD<f32>>,
}

impl WeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: ArrayD<f32>) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Sorted tensor names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(name)
    }

    fn require(&self, name: &str) -> CueResult<&ArrayD<f32>> {
        self.tensors
            .get(name)
            .ok_or_else(|| CueError::RecognizerLoadFailure(format!("missing tensor '{}'", name)))
    }

    /// Matrix `name` with exactly `shape`
    pub fn matrix(&self, name: &str, shape: (usize, usize)) -> CueResult<Array2<f32>> {
        let tensor = self.require(name)?;
        if tensor.shape() != [shape.0, shape.1] {
            return Err(shape_mismatch(name, tensor.shape(), &[shape.0, shape.1]));
        }
        tensor
            .clone()
            .into_dimensionality()
            .map_err(|e| CueError::RecognizerLoadFailure(format!("tensor '{}': {}", name, e)))
    }

    /// Vector `name` with exactly `len` elements
    pub fn vector(&self, name: &str, len: usize) -> CueResult<Array1<f32>> {
        let tensor = self.require(name)?;
        if tensor.shape() != [len] {
            return Err(shape_mismatch(name, tensor.shape(), &[len]));
        }
        tensor
            .clone()
            .into_dimensionality()
            .map_err(|e| CueError::RecognizerLoadFailure(format!("tensor '{}': {}", name, e)))
    }

    /// Load a safetensors file; F16 tensors are widened to f32
    pub fn load(path: impl AsRef<Path>) -> CueResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            CueError::RecognizerLoadFailure(format!("weights {}: {}", path.display(), e))
        })?;
        let store = Self::from_bytes(&bytes)?;
        debug!(path = %path.display(), tensors = store.len(), "loaded weights");
        Ok(store)
    }

    pub fn from_bytes(bytes: &[u8]) -> CueResult<Self> {
        let st = SafeTensors::deserialize(bytes)
            .map_err(|e| CueError::RecognizerLoadFailure(format!("safetensors: {}", e)))?;

        let mut tensors = HashMap::new();
        for (name, view) in st.tensors() {
            let data = decode(&name, view.dtype(), view.data())?;
            let array = ArrayD::from_shape_vec(IxDyn(view.shape()), data)
                .map_err(|e| CueError::RecognizerLoadFailure(format!("tensor '{}': {}", name, e)))?;
            tensors.insert(name, array);
        }
        Ok(Self { tensors })
    }

    /// Serialize to safetensors bytes at `precision`
    pub fn to_bytes(&self, precision: Precision) -> CueResult<Vec<u8>> {
        let encoded: Vec<(String, Vec<usize>, Vec<u8>)> = self
            .names()
            .into_iter()
            .map(|name| {
                let tensor = &self.tensors[name];
                (name.to_string(), tensor.shape().to_vec(), encode(tensor, precision))
            })
            .collect();

        let dtype = match precision {
            Precision::F32 => Dtype::F32,
            Precision::F16 => Dtype::F16,
        };
        let mut views = Vec::with_capacity(encoded.len());
        for (name, shape, data) in &encoded {
            let view = TensorView::new(dtype, shape.clone(), data)
                .map_err(|e| CueError::Serialization(format!("tensor '{}': {}", name, e)))?;
            views.push((name.clone(), view));
        }

        safetensors::serialize(views, &None).map_err(|e| CueError::Serialization(e.to_string()))
    }

    /// Write a safetensors file at `precision`
    pub fn save(&self, path: impl AsRef<Path>, precision: Precision) -> CueResult<()> {
        let bytes = self.to_bytes(precision)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Uniform `[-1/sqrt(H), 1/sqrt(H)]` initialization for every parameter
    /// of the recognizer, reproducible from `seed`.
    pub fn random(config: &RecognizerConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut store = WeightStore::new();

        let mut fill = |store: &mut WeightStore, name: String, shape: &[usize], bound: f32| {
            let n: usize = shape.iter().product();
            let data: Vec<f32> = (0..n).map(|_| rng.gen_range(-bound..=bound)).collect();
            if let Ok(array) = ArrayD::from_shape_vec(IxDyn(shape), data) {
                store.insert(name, array);
            }
        };

        let h = config.hidden_size;
        let grus = ENCODER_NAMES
            .iter()
            .zip(config.stream_dims())
            .map(|(name, dim)| (*name, dim, h))
            .chain(std::iter::once((FUSION_NAME, config.fusion_input(), config.fusion_hidden())));

        for (gru, input, hidden) in grus {
            let bound = 1.0 / (hidden as f32).sqrt();
            for layer in 0..config.num_layers {
                let layer_input = if layer == 0 { input } else { 2 * hidden };
                for reverse in [false, true] {
                    let names = gru_parameter_names(gru, layer, reverse);
                    fill(&mut store, names.weight_ih, &[3 * hidden, layer_input], bound);
                    fill(&mut store, names.weight_hh, &[3 * hidden, hidden], bound);
                    fill(&mut store, names.bias_ih, &[3 * hidden], bound);
                    fill(&mut store, names.bias_hh, &[3 * hidden], bound);
                }
            }
        }

        let proj = config.projection_input();
        let bound = 1.0 / (proj as f32).sqrt();
        fill(&mut store, PROJECTION_WEIGHT.into(), &[config.vocab_size, proj], bound);
        fill(&mut store, PROJECTION_BIAS.into(), &[config.vocab_size], bound);

        store
    }
}

fn shape_mismatch(name: &str, found: &[usize], expected: &[usize]) -> CueError {
    CueError::RecognizerLoadFailure(format!(
        "tensor '{}' has shape {:?}, expected {:?}",
        name, found, expected
    ))
}

fn decode(name: &str, dtype: Dtype, data: &[u8]) -> CueResult<Vec<f32>> {
    match dtype {
        Dtype::F32 => Ok(data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()),
        Dtype::F16 => Ok(data
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect()),
        other => Err(CueError::RecognizerLoadFailure(format!(
            "tensor '{}' has unsupported dtype {:?}",
            name, other
        ))),
    }
}

fn encode(tensor: &ArrayD<f32>, precision: Precision) -> Vec<u8> {
    match precision {
        Precision::F32 => tensor.iter().flat_map(|v| v.to_le_bytes()).collect(),
        Precision::F16 => tensor
            .iter()
            .flat_map(|v| f16::from_f32(*v).to_le_bytes())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_matrix_shape_checked() {
        let mut store = WeightStore::new();
        store.insert("w", arr2(&[[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn());

        assert_eq!(store.matrix("w", (3, 2)).unwrap()[[2, 1]], 6.0);
        let err = store.matrix("w", (2, 3)).unwrap_err();
        assert_eq!(err.condition(), "recognizer_load_failure");
        assert!(store.matrix("missing", (1, 1)).is_err());
    }

    #[test]
    fn test_file_roundtrip_f32() {
        let config = RecognizerConfig::tiny(9);
        let store = WeightStore::random(&config, 7);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");
        store.save(&path, Precision::F32).unwrap();

        let loaded = WeightStore::load(&path).unwrap();
        assert_eq!(loaded.names(), store.names());
        for name in store.names() {
            assert_eq!(loaded.get(name), store.get(name));
        }
    }

    #[test]
    fn test_half_precision_close() {
        let config = RecognizerConfig::tiny(9);
        let store = WeightStore::random(&config, 3);
        let bytes = store.to_bytes(Precision::F16).unwrap();
        let loaded = WeightStore::from_bytes(&bytes).unwrap();

        let a = store.get("ctc_fc.weight").unwrap();
        let b = loaded.get("ctc_fc.weight").unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_random_is_reproducible() {
        let config = RecognizerConfig::tiny(9);
        let a = WeightStore::random(&config, 11);
        let b = WeightStore::random(&config, 11);
        assert_eq!(a.get("ctc_fc.bias"), b.get("ctc_fc.bias"));
        // 4 GRUs x 1 layer x 2 directions x 4 tensors + projection
        assert_eq!(a.len(), 4 * 2 * 4 + 2);
    }

    #[test]
    fn test_garbage_bytes() {
        let err = WeightStore::from_bytes(b"not a safetensors file").unwrap_err();
        assert_eq!(err.condition(), "recognizer_load_failure");
    }
}
