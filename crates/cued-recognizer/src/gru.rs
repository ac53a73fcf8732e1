//! Bidirectional multi-layer GRU
//!
//! Gate layout follows the usual convention: `weight_ih` is `[3H × in]` and
//! `weight_hh` is `[3H × H]`, both stacked in r|z|n order.
//!
//! ```text
//! r  = σ(W_ir x + b_ir + W_hr h + b_hr)
//! z  = σ(W_iz x + b_iz + W_hz h + b_hz)
//! n  = tanh(W_in x + b_in + r ⊙ (W_hn h + b_hn))
//! h' = (1 − z) ⊙ n + z ⊙ h
//! ```
//!
//! Layer `k > 0` reads the `[forward | backward]` output of layer `k − 1`.
//! The backward direction walks time in reverse but writes each output at
//! its original time step.

use cued_core::{CueError, CueResult};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::WeightStore;

/// Tensor names of one GRU direction in one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GruParameterNames {
    pub weight_ih: String,
    pub weight_hh: String,
    pub bias_ih: String,
    pub bias_hh: String,
}

/// `encoder.{gru}.{param}_l{layer}[_reverse]`
pub fn gru_parameter_names(gru: &str, layer: usize, reverse: bool) -> GruParameterNames {
    let suffix = if reverse { "_reverse" } else { "" };
    let name = |param: &str| format!("encoder.{}.{}_l{}{}", gru, param, layer, suffix);
    GruParameterNames {
        weight_ih: name("weight_ih"),
        weight_hh: name("weight_hh"),
        bias_ih: name("bias_ih"),
        bias_hh: name("bias_hh"),
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// One direction of one layer
#[derive(Debug, Clone)]
pub struct GruCell {
    weight_ih: Array2<f32>,
    weight_hh: Array2<f32>,
    bias_ih: Array1<f32>,
    bias_hh: Array1<f32>,
    hidden_size: usize,
}

impl GruCell {
    pub fn new(
        weight_ih: Array2<f32>,
        weight_hh: Array2<f32>,
        bias_ih: Array1<f32>,
        bias_hh: Array1<f32>,
    ) -> CueResult<Self> {
        let hidden_size = weight_hh.ncols();
        let gates = 3 * hidden_size;
        if hidden_size == 0
            || weight_ih.nrows() != gates
            || weight_hh.nrows() != gates
            || bias_ih.len() != gates
            || bias_hh.len() != gates
        {
            return Err(CueError::RecognizerLoadFailure(format!(
                "inconsistent GRU gate shapes: ih {:?}, hh {:?}, bias {} / {}",
                weight_ih.dim(),
                weight_hh.dim(),
                bias_ih.len(),
                bias_hh.len()
            )));
        }
        Ok(Self {
            weight_ih,
            weight_hh,
            bias_ih,
            bias_hh,
            hidden_size,
        })
    }

    fn load(store: &WeightStore, names: &GruParameterNames, input: usize, hidden: usize) -> CueResult<Self> {
        Self::new(
            store.matrix(&names.weight_ih, (3 * hidden, input))?,
            store.matrix(&names.weight_hh, (3 * hidden, hidden))?,
            store.vector(&names.bias_ih, 3 * hidden)?,
            store.vector(&names.bias_hh, 3 * hidden)?,
        )
    }

    pub fn input_size(&self) -> usize {
        self.weight_ih.ncols()
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Run over `[T × in]` from `h0`, returning `[T × H]`
    pub fn run(&self, input: ArrayView2<'_, f32>, h0: ArrayView1<'_, f32>, reverse: bool) -> Array2<f32> {
        let steps = input.nrows();
        let h = self.hidden_size;
        // Input projections do not depend on the state
        let gates_x = input.dot(&self.weight_ih.t()) + &self.bias_ih;

        let mut output = Array2::zeros((steps, h));
        let mut state = h0.to_owned();
        for step in 0..steps {
            let t = if reverse { steps - 1 - step } else { step };
            let gx = gates_x.row(t);
            let gh = self.weight_hh.dot(&state) + &self.bias_hh;

            let next = Array1::from_shape_fn(h, |j| {
                let r = sigmoid(gx[j] + gh[j]);
                let z = sigmoid(gx[h + j] + gh[h + j]);
                let n = (gx[2 * h + j] + r * gh[2 * h + j]).tanh();
                (1.0 - z) * n + z * state[j]
            });
            output.row_mut(t).assign(&next);
            state = next;
        }
        output
    }
}

#[derive(Debug, Clone)]
struct BiLayer {
    forward: GruCell,
    backward: GruCell,
}

/// Stacked bidirectional GRU, output `[T × 2H]`
#[derive(Debug, Clone)]
pub struct BiGru {
    name: String,
    input_size: usize,
    hidden_size: usize,
    layers: Vec<BiLayer>,
}

impl BiGru {
    /// Load every layer of GRU `name` from `store`
    pub fn load(
        store: &WeightStore,
        name: &str,
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
    ) -> CueResult<Self> {
        let layers = (0..num_layers)
            .map(|k| {
                let input = if k == 0 { input_size } else { 2 * hidden_size };
                Ok(BiLayer {
                    forward: GruCell::load(store, &gru_parameter_names(name, k, false), input, hidden_size)?,
                    backward: GruCell::load(store, &gru_parameter_names(name, k, true), input, hidden_size)?,
                })
            })
            .collect::<CueResult<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            input_size,
            hidden_size,
            layers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn output_size(&self) -> usize {
        2 * self.hidden_size
    }

    /// `[2L × H]` zeros; row `2k` seeds layer `k` forward, `2k + 1` backward
    pub fn zero_state(&self) -> Array2<f32> {
        Array2::zeros((2 * self.layers.len(), self.hidden_size))
    }

    pub fn forward(&self, input: ArrayView2<'_, f32>) -> CueResult<Array2<f32>> {
        self.forward_with_state(input, self.zero_state().view())
    }

    pub fn forward_with_state(&self, input: ArrayView2<'_, f32>, h0: ArrayView2<'_, f32>) -> CueResult<Array2<f32>> {
        if input.ncols() != self.input_size {
            return Err(CueError::FeatureMismatch(format!(
                "{} expects {} input features, got {}",
                self.name,
                self.input_size,
                input.ncols()
            )));
        }
        let expected = (2 * self.layers.len(), self.hidden_size);
        if h0.dim() != expected {
            return Err(CueError::FeatureMismatch(format!(
                "{} initial state is {:?}, expected {:?}",
                self.name,
                h0.dim(),
                expected
            )));
        }

        let mut x = input.to_owned();
        for (k, layer) in self.layers.iter().enumerate() {
            let fwd = layer.forward.run(x.view(), h0.row(2 * k), false);
            let bwd = layer.backward.run(x.view(), h0.row(2 * k + 1), true);
            x = concatenate(Axis(1), &[fwd.view(), bwd.view()])
                .map_err(|e| CueError::FeatureMismatch(e.to_string()))?;
        }
        Ok(x)
    }
}
