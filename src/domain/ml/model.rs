use super::sequence::SequenceTensors;
use crate::domain::errors::PipelineError;
use ndarray::{Array1, ArrayView3};
use serde::{Deserialize, Serialize};

/// Iteration budget handed to a trainable model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSchedule {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Stop after this many epochs without validation improvement.
    pub patience: Option<usize>,
    pub seed: u64,
}

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub train_loss: Vec<f64>,
    pub validation_loss: Vec<f64>,
    pub stopped_early: bool,
}

/// Interface for trainable sequence-to-scalar regressors.
pub trait SequenceRegressor: Send + Sync {
    /// Fits the model on `train`, tracking loss on `validation` when given.
    fn fit(
        &mut self,
        train: &SequenceTensors,
        validation: Option<&SequenceTensors>,
        schedule: &TrainingSchedule,
    ) -> Result<TrainingReport, PipelineError>;

    /// Inference-mode forward pass: one prediction per input window.
    /// Takes `&self`, so no parameter or optimizer state can change.
    fn predict(&self, inputs: ArrayView3<f64>) -> Result<Array1<f64>, PipelineError>;

    /// Get model name/type
    fn name(&self) -> &str;
}
