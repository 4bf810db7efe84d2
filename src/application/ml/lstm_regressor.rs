//! Single-layer LSTM with a linear head, trained by full
//! backpropagation-through-time.
//!
//! Gate pre-activations are stacked in one `[4H]` vector in the order
//! input, forget, output, candidate.

use crate::domain::errors::PipelineError;
use crate::domain::ml::model::{SequenceRegressor, TrainingReport, TrainingSchedule};
use crate::domain::ml::sequence::SequenceTensors;
use ndarray::linalg::general_mat_mul;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3, ArrayViewD, ArrayViewMutD, Axis, Zip, s};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LstmConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    /// Maximum global L2 norm of a batch gradient.
    pub gradient_clip: Option<f64>,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl LstmConfig {
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            gradient_clip: Some(1.0),
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_gradient_clip(mut self, clip: Option<f64>) -> Self {
        self.gradient_clip = clip;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LstmParams {
    /// Input weights `[4H, I]`.
    w: Array2<f64>,
    /// Recurrent weights `[4H, H]`.
    u: Array2<f64>,
    b: Array1<f64>,
    w_out: Array1<f64>,
    /// Length 1.
    b_out: Array1<f64>,
}

impl LstmParams {
    fn init(config: &LstmConfig) -> Self {
        let (i, h) = (config.input_size, config.hidden_size);
        let limit = 1.0 / (h as f64).sqrt();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut uniform =
            |shape: (usize, usize)| Array2::from_shape_fn(shape, |_| rng.random_range(-limit..limit));

        let w = uniform((4 * h, i));
        let u = uniform((4 * h, h));
        let w_out = Array1::from_shape_fn(h, |_| rng.random_range(-limit..limit));

        // Forget gate starts open.
        let mut b = Array1::zeros(4 * h);
        b.slice_mut(s![h..2 * h]).fill(1.0);

        Self {
            w,
            u,
            b,
            w_out,
            b_out: Array1::zeros(1),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            w: Array2::zeros(self.w.raw_dim()),
            u: Array2::zeros(self.u.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
            w_out: Array1::zeros(self.w_out.raw_dim()),
            b_out: Array1::zeros(self.b_out.raw_dim()),
        }
    }

    fn tensors(&self) -> [ArrayViewD<'_, f64>; 5] {
        [
            self.w.view().into_dyn(),
            self.u.view().into_dyn(),
            self.b.view().into_dyn(),
            self.w_out.view().into_dyn(),
            self.b_out.view().into_dyn(),
        ]
    }

    fn tensors_mut(&mut self) -> [ArrayViewMutD<'_, f64>; 5] {
        [
            self.w.view_mut().into_dyn(),
            self.u.view_mut().into_dyn(),
            self.b.view_mut().into_dyn(),
            self.w_out.view_mut().into_dyn(),
            self.b_out.view_mut().into_dyn(),
        ]
    }

    fn global_norm(&self) -> f64 {
        self.tensors()
            .iter()
            .map(|t| t.fold(0.0, |acc, &v| acc + v * v))
            .sum::<f64>()
            .sqrt()
    }

    fn scale(&mut self, factor: f64) {
        for mut t in self.tensors_mut() {
            t.mapv_inplace(|v| v * factor);
        }
    }
}

/// Activations of one time step, kept for the backward pass.
struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    o: Array1<f64>,
    g: Array1<f64>,
    c: Array1<f64>,
    tanh_c: Array1<f64>,
    h: Array1<f64>,
}

/// First and second moment estimates of the Adam optimizer.
struct Adam {
    m: LstmParams,
    v: LstmParams,
    t: i32,
    learning_rate: f64,
}

impl Adam {
    fn new(params: &LstmParams, learning_rate: f64) -> Self {
        Self {
            m: params.zeros_like(),
            v: params.zeros_like(),
            t: 0,
            learning_rate,
        }
    }

    fn step(&mut self, params: &mut LstmParams, grads: &LstmParams) {
        self.t += 1;
        let bias1 = 1.0 - ADAM_BETA1.powi(self.t);
        let bias2 = 1.0 - ADAM_BETA2.powi(self.t);
        let lr = self.learning_rate;

        let moments = self.m.tensors_mut().into_iter().zip(self.v.tensors_mut());
        for ((p, g), (m, v)) in params.tensors_mut().into_iter().zip(grads.tensors()).zip(moments) {
            Zip::from(p)
                .and(g)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
                });
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// LSTM sequence-to-scalar regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmRegressor {
    config: LstmConfig,
    params: LstmParams,
}

impl LstmRegressor {
    pub fn new(config: LstmConfig) -> Result<Self, PipelineError> {
        if config.input_size == 0 {
            return Err(PipelineError::invalid_parameter("input_size", "must be greater than 0"));
        }
        if config.hidden_size == 0 {
            return Err(PipelineError::invalid_parameter("hidden_size", "must be greater than 0"));
        }
        Ok(Self {
            params: LstmParams::init(&config),
            config,
        })
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    pub fn to_json(&self) -> Result<Vec<u8>, PipelineError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, PipelineError> {
        let model: Self = serde_json::from_slice(bytes)?;
        let (h, i) = (model.config.hidden_size, model.config.input_size);
        if model.params.w.dim() != (4 * h, i)
            || model.params.u.dim() != (4 * h, h)
            || model.params.b.len() != 4 * h
            || model.params.w_out.len() != h
            || model.params.b_out.len() != 1
        {
            return Err(PipelineError::Serialization {
                reason: "stored LSTM weights do not match its configuration".to_string(),
            });
        }
        Ok(model)
    }

    fn step(&self, x: ArrayView1<f64>, h_prev: Array1<f64>, c_prev: Array1<f64>) -> StepCache {
        let n = self.config.hidden_size;
        let z = self.params.w.dot(&x) + self.params.u.dot(&h_prev) + &self.params.b;

        let i = z.slice(s![0..n]).mapv(sigmoid);
        let f = z.slice(s![n..2 * n]).mapv(sigmoid);
        let o = z.slice(s![2 * n..3 * n]).mapv(sigmoid);
        let g = z.slice(s![3 * n..]).mapv(f64::tanh);

        let c = &f * &c_prev + &i * &g;
        let tanh_c = c.mapv(f64::tanh);
        let h = &o * &tanh_c;

        StepCache {
            x: x.to_owned(),
            h_prev,
            c_prev,
            i,
            f,
            o,
            g,
            c,
            tanh_c,
            h,
        }
    }

    /// Runs one window through the network, returning the output and the
    /// per-step activations.
    fn forward(&self, window: ArrayView2<f64>) -> (f64, Vec<StepCache>) {
        let h = self.config.hidden_size;
        let mut hidden = Array1::zeros(h);
        let mut cell = Array1::zeros(h);
        let mut caches = Vec::with_capacity(window.nrows());

        for x in window.axis_iter(Axis(0)) {
            let step = self.step(x, hidden, cell);
            hidden = step.h.clone();
            cell = step.c.clone();
            caches.push(step);
        }

        let y = self.params.w_out.dot(&hidden) + self.params.b_out[0];
        (y, caches)
    }

    /// Accumulates the gradient of one window's loss into `grads`.
    fn backward(&self, caches: &[StepCache], dy: f64, grads: &mut LstmParams) {
        let h = self.config.hidden_size;

        if let Some(last) = caches.last() {
            grads.w_out.scaled_add(dy, &last.h);
        }
        grads.b_out[0] += dy;

        let mut dh = &self.params.w_out * dy;
        let mut dc = Array1::<f64>::zeros(h);
        let mut dz = Array1::<f64>::zeros(4 * h);

        for step in caches.iter().rev() {
            let d_o = &dh * &step.tanh_c;
            dc = dc + &dh * &step.o * &step.tanh_c.mapv(|t| 1.0 - t * t);
            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;

            dz.slice_mut(s![0..h])
                .assign(&(&d_i * &step.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![h..2 * h])
                .assign(&(&d_f * &step.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * h..3 * h])
                .assign(&(&d_o * &step.o.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![3 * h..])
                .assign(&(&d_g * &step.g.mapv(|v| 1.0 - v * v)));

            let dz_col = dz.view().insert_axis(Axis(1));
            general_mat_mul(1.0, &dz_col, &step.x.view().insert_axis(Axis(0)), 1.0, &mut grads.w);
            general_mat_mul(1.0, &dz_col, &step.h_prev.view().insert_axis(Axis(0)), 1.0, &mut grads.u);
            grads.b += &dz;

            dh = self.params.u.t().dot(&dz);
            dc = dc * &step.f;
        }
    }

    /// One optimizer step on the windows selected by `batch`. Returns the
    /// summed squared error of the batch.
    fn train_batch(&mut self, data: &SequenceTensors, batch: &[usize], adam: &mut Adam) -> f64 {
        let mut grads = self.params.zeros_like();
        let n = batch.len() as f64;
        let mut sse = 0.0;

        for &idx in batch {
            let (y, caches) = self.forward(data.inputs.index_axis(Axis(0), idx));
            let err = y - data.targets[idx];
            sse += err * err;
            self.backward(&caches, 2.0 * err / n, &mut grads);
        }

        if let Some(max_norm) = self.config.gradient_clip {
            let norm = grads.global_norm();
            if norm > max_norm {
                grads.scale(max_norm / norm);
            }
        }

        adam.step(&mut self.params, &grads);
        sse
    }

    fn mean_squared_error(&self, data: &SequenceTensors) -> Result<f64, PipelineError> {
        let predictions = self.predict(data.inputs.view())?;
        let diff = predictions - &data.targets;
        Ok(diff.mapv(|v| v * v).mean().unwrap_or(0.0))
    }

    fn check_inputs(&self, inputs: ArrayView3<f64>) -> Result<(), PipelineError> {
        if inputs.shape()[2] != self.config.input_size {
            return Err(PipelineError::invalid_data(format!(
                "model expects {} features per step, got {}",
                self.config.input_size,
                inputs.shape()[2]
            )));
        }
        Ok(())
    }
}

impl SequenceRegressor for LstmRegressor {
    fn fit(
        &mut self,
        train: &SequenceTensors,
        validation: Option<&SequenceTensors>,
        schedule: &TrainingSchedule,
    ) -> Result<TrainingReport, PipelineError> {
        self.check_inputs(train.inputs.view())?;
        if let Some(validation) = validation {
            self.check_inputs(validation.inputs.view())?;
        }
        if train.is_empty() {
            return Err(PipelineError::InsufficientData {
                required: 1,
                available: 0,
            });
        }
        if schedule.batch_size == 0 {
            return Err(PipelineError::invalid_parameter("batch_size", "must be greater than 0"));
        }

        let mut rng = StdRng::seed_from_u64(schedule.seed);
        let mut adam = Adam::new(&self.params, schedule.learning_rate);
        let mut order: Vec<usize> = (0..train.len()).collect();

        let mut report = TrainingReport {
            epochs_run: 0,
            train_loss: Vec::with_capacity(schedule.epochs),
            validation_loss: Vec::new(),
            stopped_early: false,
        };
        let mut best: Option<(f64, LstmParams)> = None;
        let mut epochs_without_improvement = 0;

        for epoch in 1..=schedule.epochs {
            order.shuffle(&mut rng);

            let mut sse = 0.0;
            for batch in order.chunks(schedule.batch_size) {
                sse += self.train_batch(train, batch, &mut adam);
            }
            let train_loss = sse / train.len() as f64;
            report.train_loss.push(train_loss);
            report.epochs_run = epoch;

            let Some(validation) = validation.filter(|v| !v.is_empty()) else {
                debug!("LstmRegressor: Epoch {} train_loss={:.6}", epoch, train_loss);
                continue;
            };

            let val_loss = self.mean_squared_error(validation)?;
            report.validation_loss.push(val_loss);
            debug!(
                "LstmRegressor: Epoch {} train_loss={:.6} val_loss={:.6}",
                epoch, train_loss, val_loss
            );

            let improved = best.as_ref().is_none_or(|(best_loss, _)| val_loss < *best_loss);
            if improved {
                best = Some((val_loss, self.params.clone()));
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
            }

            if let Some(patience) = schedule.patience {
                if epochs_without_improvement >= patience {
                    info!(
                        "LstmRegressor: Early stopping at epoch {} (no improvement for {} epochs)",
                        epoch, patience
                    );
                    report.stopped_early = true;
                    break;
                }
            }
        }

        if let Some((best_loss, params)) = best {
            debug!("LstmRegressor: Restoring best weights (val_loss={:.6})", best_loss);
            self.params = params;
        }

        Ok(report)
    }

    fn predict(&self, inputs: ArrayView3<f64>) -> Result<Array1<f64>, PipelineError> {
        self.check_inputs(inputs)?;
        Ok(inputs
            .axis_iter(Axis(0))
            .map(|window| self.forward(window).0)
            .collect())
    }

    fn name(&self) -> &str {
        "lstm"
    }
}
