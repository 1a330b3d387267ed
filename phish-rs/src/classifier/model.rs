//! Two-branch scoring model
//!
//! Branch A: token ids → embedding → LSTM, keeping the final hidden state.
//! Branch B: scaled numeric features → dense(relu).
//! Head: concat → dense(relu) → dropout → dense → softmax over the three labels.
//!
//! LSTM gate layout in the fused kernels is `[input, forget, cell, output]`.

use ndarray::{s, Array1, Array2, ArrayViewD, ArrayViewMutD, Axis, Zip};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use super::features::{FeatureVector, FEATURE_COUNT};
use super::labels::{Label, ProbabilityTriple};
use crate::config::ModelConfig;
use crate::error::{Result, ScanError};

/// Learnable weights. Kernels are `(inputs, outputs)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    pub embedding: Array2<f32>,
    pub lstm_kernel: Array2<f32>,
    pub lstm_recurrent: Array2<f32>,
    pub lstm_bias: Array1<f32>,
    pub numeric_kernel: Array2<f32>,
    pub numeric_bias: Array1<f32>,
    pub hidden_kernel: Array2<f32>,
    pub hidden_bias: Array1<f32>,
    pub output_kernel: Array2<f32>,
    pub output_bias: Array1<f32>,
}

impl Parameters {
    fn init(config: &ModelConfig, rng: &mut dyn RngCore) -> Self {
        let e = config.embedding_dim;
        let h = config.lstm_units;
        let n = config.numeric_units;
        let d = config.hidden_units;

        let embedding_dist = Uniform::new_inclusive(-0.05f32, 0.05);
        let embedding =
            Array2::from_shape_fn((config.max_words, e), |_| embedding_dist.sample(&mut *rng));

        // Forget gate bias starts at 1
        let mut lstm_bias = Array1::<f32>::zeros(4 * h);
        lstm_bias.slice_mut(s![h..2 * h]).fill(1.0);

        Self {
            embedding,
            lstm_kernel: glorot_uniform(e, 4 * h, rng),
            lstm_recurrent: glorot_uniform(h, 4 * h, rng),
            lstm_bias,
            numeric_kernel: glorot_uniform(FEATURE_COUNT, n, rng),
            numeric_bias: Array1::zeros(n),
            hidden_kernel: glorot_uniform(h + n, d, rng),
            hidden_bias: Array1::zeros(d),
            output_kernel: glorot_uniform(d, Label::COUNT, rng),
            output_bias: Array1::zeros(Label::COUNT),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            embedding: Array2::zeros(self.embedding.raw_dim()),
            lstm_kernel: Array2::zeros(self.lstm_kernel.raw_dim()),
            lstm_recurrent: Array2::zeros(self.lstm_recurrent.raw_dim()),
            lstm_bias: Array1::zeros(self.lstm_bias.raw_dim()),
            numeric_kernel: Array2::zeros(self.numeric_kernel.raw_dim()),
            numeric_bias: Array1::zeros(self.numeric_bias.raw_dim()),
            hidden_kernel: Array2::zeros(self.hidden_kernel.raw_dim()),
            hidden_bias: Array1::zeros(self.hidden_bias.raw_dim()),
            output_kernel: Array2::zeros(self.output_kernel.raw_dim()),
            output_bias: Array1::zeros(self.output_bias.raw_dim()),
        }
    }

    fn views(&self) -> Vec<ArrayViewD<'_, f32>> {
        vec![
            self.embedding.view().into_dyn(),
            self.lstm_kernel.view().into_dyn(),
            self.lstm_recurrent.view().into_dyn(),
            self.lstm_bias.view().into_dyn(),
            self.numeric_kernel.view().into_dyn(),
            self.numeric_bias.view().into_dyn(),
            self.hidden_kernel.view().into_dyn(),
            self.hidden_bias.view().into_dyn(),
            self.output_kernel.view().into_dyn(),
            self.output_bias.view().into_dyn(),
        ]
    }

    fn views_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        vec![
            self.embedding.view_mut().into_dyn(),
            self.lstm_kernel.view_mut().into_dyn(),
            self.lstm_recurrent.view_mut().into_dyn(),
            self.lstm_bias.view_mut().into_dyn(),
            self.numeric_kernel.view_mut().into_dyn(),
            self.numeric_bias.view_mut().into_dyn(),
            self.hidden_kernel.view_mut().into_dyn(),
            self.hidden_bias.view_mut().into_dyn(),
            self.output_kernel.view_mut().into_dyn(),
            self.output_bias.view_mut().into_dyn(),
        ]
    }

    fn is_finite(&self) -> bool {
        self.views().iter().all(|v| v.iter().all(|x| x.is_finite()))
    }
}

fn glorot_uniform(fan_in: usize, fan_out: usize, rng: &mut dyn RngCore) -> Array2<f32> {
    let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);
    Array2::from_shape_fn((fan_in, fan_out), |_| dist.sample(&mut *rng))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Inverted dropout mask, or `None` when the rate disables dropout
fn dropout_mask(shape: (usize, usize), rate: f32, rng: &mut dyn RngCore) -> Option<Array2<f32>> {
    if rate <= 0.0 {
        return None;
    }
    let keep = 1.0 / (1.0 - rate);
    let unit = Uniform::new(0.0f32, 1.0);
    Some(Array2::from_shape_fn(shape, |_| {
        if unit.sample(&mut *rng) < rate {
            0.0
        } else {
            keep
        }
    }))
}

fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut probs = logits.clone();
    for mut row in probs.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

/// Mean categorical cross-entropy
pub(crate) fn cross_entropy(probs: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    let batch = probs.nrows().max(1) as f32;
    let total: f32 = Zip::from(probs)
        .and(targets)
        .fold(0.0, |acc, &p, &y| acc - y * p.max(1e-7).ln());
    total / batch
}

/// Cached activations of one LSTM timestep
struct LstmStep {
    x: Array2<f32>,
    h_in: Array2<f32>,
    c_prev: Array2<f32>,
    i: Array2<f32>,
    f: Array2<f32>,
    g: Array2<f32>,
    o: Array2<f32>,
    c: Array2<f32>,
}

/// Everything backprop needs from a forward pass
pub(crate) struct ForwardPass {
    steps: Vec<LstmStep>,
    input_mask: Option<Array2<f32>>,
    recurrent_mask: Option<Array2<f32>>,
    numeric_in: Array2<f32>,
    numeric_pre: Array2<f32>,
    concat: Array2<f32>,
    hidden_pre: Array2<f32>,
    hidden_mask: Option<Array2<f32>>,
    hidden_out: Array2<f32>,
    pub(crate) probs: Array2<f32>,
}

/// Dual-input classifier producing a probability triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringModel {
    config: ModelConfig,
    params: Parameters,
}

impl ScoringModel {
    /// Freshly initialized model
    pub fn new(config: ModelConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let params = Parameters::init(&config, &mut rng);
        Self { config, params }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub(crate) fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    pub(crate) fn set_parameters(&mut self, params: Parameters) {
        self.params = params;
    }

    /// Check that the weights agree with the declared shape
    pub fn check_shapes(&self) -> Result<()> {
        let c = &self.config;
        let p = &self.params;
        let (e, h, n, d) = (c.embedding_dim, c.lstm_units, c.numeric_units, c.hidden_units);

        let expected: [(&str, &[usize], Vec<usize>); 10] = [
            ("embedding", p.embedding.shape(), vec![c.max_words, e]),
            ("lstm_kernel", p.lstm_kernel.shape(), vec![e, 4 * h]),
            ("lstm_recurrent", p.lstm_recurrent.shape(), vec![h, 4 * h]),
            ("lstm_bias", p.lstm_bias.shape(), vec![4 * h]),
            ("numeric_kernel", p.numeric_kernel.shape(), vec![FEATURE_COUNT, n]),
            ("numeric_bias", p.numeric_bias.shape(), vec![n]),
            ("hidden_kernel", p.hidden_kernel.shape(), vec![h + n, d]),
            ("hidden_bias", p.hidden_bias.shape(), vec![d]),
            ("output_kernel", p.output_kernel.shape(), vec![d, Label::COUNT]),
            ("output_bias", p.output_bias.shape(), vec![Label::COUNT]),
        ];

        for (name, actual, wanted) in expected {
            if actual != wanted.as_slice() {
                return Err(ScanError::Artifact(format!(
                    "model tensor {} has shape {:?}, expected {:?}",
                    name, actual, wanted
                )));
            }
        }

        if !p.is_finite() {
            return Err(ScanError::Artifact("model weights contain non-finite values".to_string()));
        }

        Ok(())
    }

    /// Classify one encoded message
    pub fn predict(&self, sequence: &[u32], numeric: &FeatureVector) -> Result<ProbabilityTriple> {
        if sequence.len() != self.config.max_len {
            return Err(ScanError::Artifact(format!(
                "sequence length {} does not match model input length {}",
                sequence.len(),
                self.config.max_len
            )));
        }
        if let Some(&bad) = sequence.iter().find(|&&id| id as usize >= self.config.max_words) {
            return Err(ScanError::Artifact(format!(
                "token id {} outside embedding table of {} rows",
                bad, self.config.max_words
            )));
        }

        let tokens = Array2::from_shape_vec((1, sequence.len()), sequence.to_vec())
            .map_err(|e| ScanError::Artifact(e.to_string()))?;
        let numeric = Array2::from_shape_vec((1, FEATURE_COUNT), numeric.to_vec())
            .map_err(|e| ScanError::Artifact(e.to_string()))?;

        let probs = self.predict_batch(&tokens, &numeric);
        Ok(ProbabilityTriple::new(probs[[0, 0]], probs[[0, 1]], probs[[0, 2]]))
    }

    /// Probabilities for a batch, dropout disabled
    pub fn predict_batch(&self, tokens: &Array2<u32>, numeric: &Array2<f32>) -> Array2<f32> {
        self.forward(tokens, numeric, None).probs
    }

    pub(crate) fn forward(
        &self,
        tokens: &Array2<u32>,
        numeric: &Array2<f32>,
        mut rng: Option<&mut dyn RngCore>,
    ) -> ForwardPass {
        let p = &self.params;
        let c = &self.config;
        let (batch, steps) = tokens.dim();
        let hu = c.lstm_units;

        let input_mask = rng
            .as_deref_mut()
            .and_then(|r| dropout_mask((batch, c.embedding_dim), c.lstm_dropout, r));
        let recurrent_mask = rng
            .as_deref_mut()
            .and_then(|r| dropout_mask((batch, hu), c.lstm_dropout, r));

        let mut h = Array2::<f32>::zeros((batch, hu));
        let mut cell = Array2::<f32>::zeros((batch, hu));
        let mut cache = Vec::with_capacity(steps);

        for t in 0..steps {
            let mut x = Array2::<f32>::zeros((batch, c.embedding_dim));
            for b in 0..batch {
                x.row_mut(b).assign(&p.embedding.row(tokens[[b, t]] as usize));
            }
            if let Some(mask) = &input_mask {
                x *= mask;
            }
            let h_in = match &recurrent_mask {
                Some(mask) => &h * mask,
                None => h.clone(),
            };

            let gates = x.dot(&p.lstm_kernel) + h_in.dot(&p.lstm_recurrent) + &p.lstm_bias;
            let i = gates.slice(s![.., 0..hu]).mapv(sigmoid);
            let f = gates.slice(s![.., hu..2 * hu]).mapv(sigmoid);
            let g = gates.slice(s![.., 2 * hu..3 * hu]).mapv(f32::tanh);
            let o = gates.slice(s![.., 3 * hu..]).mapv(sigmoid);

            let c_next = &f * &cell + &i * &g;
            h = &o * &c_next.mapv(f32::tanh);

            cache.push(LstmStep {
                x,
                h_in,
                c_prev: cell,
                i,
                f,
                g,
                o,
                c: c_next.clone(),
            });
            cell = c_next;
        }

        let numeric_pre = numeric.dot(&p.numeric_kernel) + &p.numeric_bias;
        let numeric_act = numeric_pre.mapv(|v| v.max(0.0));

        let mut concat = Array2::<f32>::zeros((batch, hu + c.numeric_units));
        concat.slice_mut(s![.., ..hu]).assign(&h);
        concat.slice_mut(s![.., hu..]).assign(&numeric_act);

        let hidden_pre = concat.dot(&p.hidden_kernel) + &p.hidden_bias;
        let mut hidden_out = hidden_pre.mapv(|v| v.max(0.0));
        let hidden_mask = rng
            .as_deref_mut()
            .and_then(|r| dropout_mask((batch, c.hidden_units), c.dropout, r));
        if let Some(mask) = &hidden_mask {
            hidden_out *= mask;
        }

        let logits = hidden_out.dot(&p.output_kernel) + &p.output_bias;
        let probs = softmax_rows(&logits);

        ForwardPass {
            steps: cache,
            input_mask,
            recurrent_mask,
            numeric_in: numeric.clone(),
            numeric_pre,
            concat,
            hidden_pre,
            hidden_mask,
            hidden_out,
            probs,
        }
    }

    /// Gradients of the mean cross-entropy with respect to every parameter
    pub(crate) fn backward(
        &self,
        pass: &ForwardPass,
        tokens: &Array2<u32>,
        targets: &Array2<f32>,
    ) -> Parameters {
        let p = &self.params;
        let hu = self.config.lstm_units;
        let batch = targets.nrows();
        let mut grads = p.zeros_like();

        let dlogits = (&pass.probs - targets) / batch as f32;
        grads.output_kernel = pass.hidden_out.t().dot(&dlogits);
        grads.output_bias = dlogits.sum_axis(Axis(0));

        let mut dhidden = dlogits.dot(&p.output_kernel.t());
        if let Some(mask) = &pass.hidden_mask {
            dhidden *= mask;
        }
        Zip::from(&mut dhidden)
            .and(&pass.hidden_pre)
            .for_each(|d, &z| {
                if z <= 0.0 {
                    *d = 0.0;
                }
            });
        grads.hidden_kernel = pass.concat.t().dot(&dhidden);
        grads.hidden_bias = dhidden.sum_axis(Axis(0));

        let dconcat = dhidden.dot(&p.hidden_kernel.t());
        let mut dh = dconcat.slice(s![.., ..hu]).to_owned();
        let mut dnum = dconcat.slice(s![.., hu..]).to_owned();

        Zip::from(&mut dnum)
            .and(&pass.numeric_pre)
            .for_each(|d, &z| {
                if z <= 0.0 {
                    *d = 0.0;
                }
            });
        grads.numeric_kernel = pass.numeric_in.t().dot(&dnum);
        grads.numeric_bias = dnum.sum_axis(Axis(0));

        let mut dc = Array2::<f32>::zeros((batch, hu));
        for (t, step) in pass.steps.iter().enumerate().rev() {
            let tanh_c = step.c.mapv(f32::tanh);
            let d_o = &dh * &tanh_c;
            dc = dc + &dh * &step.o * &tanh_c.mapv(|v| 1.0 - v * v);

            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;
            let dc_prev = &dc * &step.f;

            let mut dgates = Array2::<f32>::zeros((batch, 4 * hu));
            dgates
                .slice_mut(s![.., 0..hu])
                .assign(&(d_i * &step.i.mapv(|v| v * (1.0 - v))));
            dgates
                .slice_mut(s![.., hu..2 * hu])
                .assign(&(d_f * &step.f.mapv(|v| v * (1.0 - v))));
            dgates
                .slice_mut(s![.., 2 * hu..3 * hu])
                .assign(&(d_g * &step.g.mapv(|v| 1.0 - v * v)));
            dgates
                .slice_mut(s![.., 3 * hu..])
                .assign(&(d_o * &step.o.mapv(|v| v * (1.0 - v))));

            grads.lstm_kernel += &step.x.t().dot(&dgates);
            grads.lstm_recurrent += &step.h_in.t().dot(&dgates);
            grads.lstm_bias += &dgates.sum_axis(Axis(0));

            let mut dx = dgates.dot(&p.lstm_kernel.t());
            if let Some(mask) = &pass.input_mask {
                dx *= mask;
            }
            for b in 0..batch {
                let id = tokens[[b, t]] as usize;
                let mut row = grads.embedding.row_mut(id);
                row += &dx.row(b);
            }

            dh = dgates.dot(&p.lstm_recurrent.t());
            if let Some(mask) = &pass.recurrent_mask {
                dh *= mask;
            }
            dc = dc_prev;
        }

        grads
    }
}

/// Adam optimizer state
pub(crate) struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step: i32,
    m: Parameters,
    v: Parameters,
}

impl Adam {
    pub(crate) fn new(params: &Parameters, learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            m: params.zeros_like(),
            v: params.zeros_like(),
        }
    }

    pub(crate) fn update(&mut self, params: &mut Parameters, grads: &Parameters) {
        self.step += 1;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let lr = self.learning_rate * (1.0 - b2.powi(self.step)).sqrt() / (1.0 - b1.powi(self.step));

        let tensors = params
            .views_mut()
            .into_iter()
            .zip(grads.views())
            .zip(self.m.views_mut())
            .zip(self.v.views_mut());

        for (((param, grad), m), v) in tensors {
            Zip::from(param)
                .and(grad)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    *p -= lr * *m / (v.sqrt() + eps);
                });
        }
    }
}
