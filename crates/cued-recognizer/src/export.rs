//! Export to a portable graph and the on-device format
//!
//! The exported graph seeds every recurrent layer from an explicit zero
//! initial-state tensor instead of relying on implicit defaults, which edge
//! runtimes handle inconsistently. [`ExportWrapper`] runs that exact graph
//! and is checked against [`Recognizer::infer`] before anything is written.
//!
//! Artifacts:
//!
//! - `cuedspeech_model.graph.json`: inputs, GRU / concat / linear nodes, output
//! - `cuedspeech_model.safetensors` (or `_fp16`): weights and initial states
//! - `cuedspeech_model_T{n}.tflite` or `cuedspeech_model_dynamic_Tmax{n}.tflite`
//!   (with `_fp16` before the extension): produced by an [`EdgeConverter`]

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use cued_core::{CueError, CueResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    gru_parameter_names, BiGru, FeatureStreams, InitialStates, Logits, Precision, Recognizer, RecognizerConfig,
    VocabularyTable, WeightStore, ENCODER_NAMES, FUSION_NAME, PROJECTION_BIAS, PROJECTION_WEIGHT,
};

pub const MODEL_STEM: &str = "cuedspeech_model";
pub const INPUT_NAMES: [&str; 3] = ["hand_shape", "hand_pos", "lips"];
pub const OUTPUT_NAME: &str = "logits";
pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// Time-dimension regime of the exported model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeRegime {
    /// Exactly `seq_len` frames per call
    Fixed { seq_len: usize },
    /// Any length in `[1, max_len]`
    Dynamic { max_len: usize },
}

impl Default for ShapeRegime {
    fn default() -> Self {
        ShapeRegime::Fixed { seq_len: 50 }
    }
}

impl ShapeRegime {
    pub fn dynamic() -> Self {
        ShapeRegime::Dynamic { max_len: 1200 }
    }

    pub fn validate(&self) -> CueResult<()> {
        match *self {
            ShapeRegime::Fixed { seq_len: 0 } => {
                Err(CueError::InvalidConfig("fixed seq_len must be positive".into()))
            }
            ShapeRegime::Dynamic { max_len: 0 } => {
                Err(CueError::InvalidConfig("dynamic max_len must be positive".into()))
            }
            _ => Ok(()),
        }
    }

    pub fn accepts(&self, frames: usize) -> bool {
        match *self {
            ShapeRegime::Fixed { seq_len } => frames == seq_len,
            ShapeRegime::Dynamic { max_len } => (1..=max_len).contains(&frames),
        }
    }

    /// Edge model file name
    pub fn edge_file_name(&self, precision: Precision) -> String {
        let suffix = precision_suffix(precision);
        match *self {
            ShapeRegime::Fixed { seq_len } => format!("{}_T{}{}.tflite", MODEL_STEM, seq_len, suffix),
            ShapeRegime::Dynamic { max_len } => {
                format!("{}_dynamic_Tmax{}{}.tflite", MODEL_STEM, max_len, suffix)
            }
        }
    }

    fn time_dim(&self) -> Dim {
        match *self {
            ShapeRegime::Fixed { seq_len } => Dim::Fixed(seq_len),
            ShapeRegime::Dynamic { max_len } => Dim::Symbolic {
                name: "T".into(),
                min: 1,
                max: max_len,
            },
        }
    }

    /// Frame count used for the equivalence check
    fn sample_len(&self) -> usize {
        match *self {
            ShapeRegime::Fixed { seq_len } => seq_len,
            ShapeRegime::Dynamic { max_len } => max_len.min(32),
        }
    }
}

impl fmt::Display for ShapeRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeRegime::Fixed { seq_len } => write!(f, "fixed T={}", seq_len),
            ShapeRegime::Dynamic { max_len } => write!(f, "dynamic T<={}", max_len),
        }
    }
}

fn precision_suffix(precision: Precision) -> &'static str {
    match precision {
        Precision::F32 => "",
        Precision::F16 => "_fp16",
    }
}

pub fn graph_file_name() -> String {
    format!("{}.graph.json", MODEL_STEM)
}

pub fn weights_file_name(precision: Precision) -> String {
    format!("{}{}.safetensors", MODEL_STEM, precision_suffix(precision))
}

fn initial_state_name(gru: &str) -> String {
    format!("encoder.{}.initial_h", gru)
}

// ---------------------------------------------------------------------------
// Graph description
// ---------------------------------------------------------------------------

/// A tensor dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Fixed(usize),
    Symbolic { name: String, min: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<Dim>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphNode {
    Gru {
        name: String,
        input: String,
        output: String,
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        bidirectional: bool,
        /// Initializer holding the `[2L × H]` initial state
        initial_h: String,
        weights: Vec<String>,
    },
    Concat {
        inputs: Vec<String>,
        output: String,
        axis: usize,
    },
    Linear {
        input: String,
        output: String,
        weight: String,
        bias: String,
    },
}

/// Serialized model graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelGraph {
    pub format_version: u32,
    pub regime: ShapeRegime,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub nodes: Vec<GraphNode>,
}

impl ModelGraph {
    pub fn to_json(&self) -> CueResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CueError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> CueResult<Self> {
        serde_json::from_str(json).map_err(|e| CueError::Serialization(e.to_string()))
    }

    /// Every weight or initializer name the nodes reference
    pub fn referenced_tensors(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .flat_map(|node| -> Vec<&str> {
                match node {
                    GraphNode::Gru { initial_h, weights, .. } => std::iter::once(initial_h.as_str())
                        .chain(weights.iter().map(String::as_str))
                        .collect(),
                    GraphNode::Linear { weight, bias, .. } => vec![weight.as_str(), bias.as_str()],
                    GraphNode::Concat { .. } => Vec::new(),
                }
            })
            .collect()
    }
}

fn gru_node(gru: &BiGru, input: &str, output: &str) -> GraphNode {
    let weights = (0..gru.num_layers())
        .flat_map(|layer| [false, true].map(|reverse| gru_parameter_names(gru.name(), layer, reverse)))
        .flat_map(|n| [n.weight_ih, n.weight_hh, n.bias_ih, n.bias_hh])
        .collect();
    GraphNode::Gru {
        name: gru.name().to_string(),
        input: input.to_string(),
        output: output.to_string(),
        input_size: gru.input_size(),
        hidden_size: gru.hidden_size(),
        num_layers: gru.num_layers(),
        bidirectional: true,
        initial_h: initial_state_name(gru.name()),
        weights,
    }
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

/// The recognizer as exported: explicit zero initial states, bounded time
pub struct ExportWrapper<'a> {
    recognizer: &'a Recognizer,
    states: InitialStates,
    regime: ShapeRegime,
}

impl<'a> ExportWrapper<'a> {
    pub fn new(recognizer: &'a Recognizer, regime: ShapeRegime) -> CueResult<Self> {
        regime.validate()?;
        let states = InitialStates {
            encoders: [
                Array2::zeros(recognizer.encoders()[0].zero_state().dim()),
                Array2::zeros(recognizer.encoders()[1].zero_state().dim()),
                Array2::zeros(recognizer.encoders()[2].zero_state().dim()),
            ],
            fusion: Array2::zeros(recognizer.fusion().zero_state().dim()),
        };
        Ok(Self {
            recognizer,
            states,
            regime,
        })
    }

    pub fn regime(&self) -> ShapeRegime {
        self.regime
    }

    pub fn initial_states(&self) -> &InitialStates {
        &self.states
    }

    pub fn forward(&self, streams: &FeatureStreams) -> CueResult<Logits> {
        if !self.regime.accepts(streams.len()) {
            return Err(CueError::FeatureMismatch(format!(
                "{} frames outside the {} export regime",
                streams.len(),
                self.regime
            )));
        }
        self.recognizer.forward_with_states(streams, &self.states)
    }

    pub fn graph(&self) -> ModelGraph {
        let config = self.recognizer.config();
        let time = self.regime.time_dim();
        let inputs = INPUT_NAMES
            .iter()
            .zip(config.stream_dims())
            .map(|(name, dim)| TensorSpec {
                name: name.to_string(),
                shape: vec![time.clone(), Dim::Fixed(dim)],
            })
            .collect();
        let outputs = vec![TensorSpec {
            name: OUTPUT_NAME.into(),
            shape: vec![time, Dim::Fixed(config.vocab_size)],
        }];

        let encoders = self.recognizer.encoders();
        let encoded: Vec<String> = INPUT_NAMES.iter().map(|n| format!("{}_encoded", n)).collect();
        let mut nodes: Vec<GraphNode> = encoders
            .iter()
            .zip(INPUT_NAMES)
            .zip(&encoded)
            .map(|((gru, input), output)| gru_node(gru, input, output))
            .collect();
        nodes.push(GraphNode::Concat {
            inputs: encoded,
            output: "combined".into(),
            axis: 1,
        });
        nodes.push(gru_node(self.recognizer.fusion(), "combined", "fused"));
        nodes.push(GraphNode::Linear {
            input: "fused".into(),
            output: OUTPUT_NAME.into(),
            weight: PROJECTION_WEIGHT.into(),
            bias: PROJECTION_BIAS.into(),
        });

        ModelGraph {
            format_version: GRAPH_FORMAT_VERSION,
            regime: self.regime,
            inputs,
            outputs,
            nodes,
        }
    }

    /// Weights plus the initial-state initializers the graph names
    pub fn weight_store(&self, weights: &WeightStore) -> WeightStore {
        let mut store = weights.clone();
        let named = ENCODER_NAMES.iter().zip(&self.states.encoders);
        for (gru, state) in named.chain(std::iter::once((&FUSION_NAME, &self.states.fusion))) {
            store.insert(initial_state_name(gru), state.clone().into_dyn());
        }
        store
    }

    /// Largest absolute logit difference against `infer` on `streams`
    pub fn max_deviation(&self, streams: &FeatureStreams) -> CueResult<f32> {
        let exported = self.forward(streams)?;
        let reference = self.recognizer.infer(streams)?;
        Ok(exported
            .values()
            .iter()
            .zip(reference.values().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max))
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Turns the interchange artifacts into an on-device model
pub trait EdgeConverter {
    fn convert(&self, job: &ConversionJob) -> CueResult<()>;
}

/// Inputs and target of one conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub graph: PathBuf,
    pub weights: PathBuf,
    pub output: PathBuf,
    pub regime: ShapeRegime,
    pub precision: Precision,
}

/// Runs an external converter program.
///
/// Invoked as `program [args..] --graph G --weights W --output O`, followed by
/// `--seq-len N` or `--max-len N`, and `--fp16` for half precision.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command(&self, job: &ConversionJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--graph")
            .arg(&job.graph)
            .arg("--weights")
            .arg(&job.weights)
            .arg("--output")
            .arg(&job.output);
        match job.regime {
            ShapeRegime::Fixed { seq_len } => cmd.arg("--seq-len").arg(seq_len.to_string()),
            ShapeRegime::Dynamic { max_len } => cmd.arg("--max-len").arg(max_len.to_string()),
        };
        if job.precision == Precision::F16 {
            cmd.arg("--fp16");
        }
        cmd
    }
}

impl EdgeConverter for CommandConverter {
    fn convert(&self, job: &ConversionJob) -> CueResult<()> {
        let output = self.command(job).output().map_err(|e| {
            CueError::ExportToolchainFailure(format!("cannot run {}: {}", self.program.display(), e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CueError::ExportToolchainFailure(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        if !job.output.exists() {
            return Err(CueError::ExportToolchainFailure(format!(
                "{} produced no {}",
                self.program.display(),
                job.output.display()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Export entry point
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub regime: ShapeRegime,
    pub precision: Precision,
    /// Hidden size the weights were trained with
    pub hidden_size: usize,
    pub num_layers: usize,
    /// Largest tolerated logit deviation between wrapper and `infer`
    pub tolerance: f32,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            regime: ShapeRegime::default(),
            precision: Precision::F32,
            hidden_size: 128,
            num_layers: 2,
            tolerance: 1e-5,
        }
    }
}

/// Files produced by one export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifacts {
    pub graph: PathBuf,
    pub weights: PathBuf,
    pub edge_model: PathBuf,
}

fn toolchain(context: &str) -> impl Fn(CueError) -> CueError + '_ {
    move |e| CueError::ExportToolchainFailure(format!("{}: {}", context, e))
}

fn require_file(path: &Path, what: &str) -> CueResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CueError::ExportToolchainFailure(format!(
            "{} not found at {}",
            what,
            path.display()
        )))
    }
}

/// Deterministic sample streams for the equivalence check
fn sample_streams(config: &RecognizerConfig, frames: usize) -> CueResult<FeatureStreams> {
    let wave = |dim: usize, phase: f32| {
        Array2::from_shape_fn((frames, dim), |(t, j)| (t as f32 * 0.37 + j as f32 * 0.11 + phase).sin())
    };
    let [a, b, c] = config.stream_dims();
    FeatureStreams::new(wave(a, 0.0), wave(b, 1.0), wave(c, 2.0))
}

/// Export trained weights: verify the wrapper, write the graph and weights,
/// then hand them to `converter`.
///
/// Any failure is an `ExportToolchainFailure`. Files written before the
/// failing step are kept.
pub fn export(
    weights: &Path,
    vocabulary: &Path,
    options: &ExportOptions,
    converter: &dyn EdgeConverter,
) -> CueResult<ExportArtifacts> {
    require_file(weights, "weights")?;
    require_file(vocabulary, "vocabulary")?;
    options.regime.validate().map_err(toolchain("regime"))?;

    let vocab = VocabularyTable::from_csv_path(vocabulary).map_err(toolchain("vocabulary"))?;
    let config = RecognizerConfig {
        hidden_size: options.hidden_size,
        num_layers: options.num_layers,
        ..RecognizerConfig::new(vocab.len())
    };
    let store = WeightStore::load(weights).map_err(toolchain("weights"))?;
    let recognizer = Recognizer::from_weights(config.clone(), &store).map_err(toolchain("weights"))?;

    let wrapper = ExportWrapper::new(&recognizer, options.regime)?;
    let sample = sample_streams(&config, options.regime.sample_len())?;
    let deviation = wrapper.max_deviation(&sample).map_err(toolchain("equivalence check"))?;
    if deviation > options.tolerance {
        return Err(CueError::ExportToolchainFailure(format!(
            "exported graph deviates from inference by {}",
            deviation
        )));
    }

    std::fs::create_dir_all(&options.output_dir).map_err(|e| toolchain("output dir")(e.into()))?;
    let artifacts = ExportArtifacts {
        graph: options.output_dir.join(graph_file_name()),
        weights: options.output_dir.join(weights_file_name(options.precision)),
        edge_model: options.output_dir.join(options.regime.edge_file_name(options.precision)),
    };

    let graph = wrapper.graph().to_json()?;
    std::fs::write(&artifacts.graph, graph).map_err(|e| toolchain("graph")(e.into()))?;
    wrapper
        .weight_store(&store)
        .save(&artifacts.weights, options.precision)
        .map_err(toolchain("weights"))?;

    let job = ConversionJob {
        graph: artifacts.graph.clone(),
        weights: artifacts.weights.clone(),
        output: artifacts.edge_model.clone(),
        regime: options.regime,
        precision: options.precision,
    };
    if let Err(e) = converter.convert(&job) {
        error!(regime = %options.regime, error = %e, "edge conversion failed");
        return Err(match e {
            CueError::ExportToolchainFailure(_) => e,
            other => toolchain("converter")(other),
        });
    }

    info!(
        regime = %options.regime,
        model = %artifacts.edge_model.display(),
        "exported recognizer"
    );
    Ok(artifacts)
}
