use super::lstm_regressor::{LstmConfig, LstmRegressor};
use crate::domain::errors::PipelineError;
use crate::domain::ml::model::{SequenceRegressor, TrainingReport, TrainingSchedule};
use crate::domain::ml::request::validate_epochs;
use crate::domain::ml::sequence::SequenceTensors;
use std::time::Instant;
use tracing::info;

/// Hyperparameters that stay fixed across training requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    pub hidden_size: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub patience: Option<usize>,
    pub gradient_clip: Option<f64>,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            learning_rate: 0.001,
            batch_size: 32,
            patience: None,
            gradient_clip: Some(1.0),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: LstmRegressor,
    pub report: TrainingReport,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn train(
        &self,
        train: &SequenceTensors,
        test: &SequenceTensors,
        epochs: usize,
    ) -> Result<TrainedModel, PipelineError> {
        validate_epochs(epochs)?;
        Self::validate_partitions(train, test)?;

        let config = LstmConfig::new(train.n_features(), self.config.hidden_size)
            .with_seed(self.config.seed)
            .with_gradient_clip(self.config.gradient_clip);
        let mut model = LstmRegressor::new(config)?;

        let schedule = TrainingSchedule {
            epochs,
            batch_size: self.config.batch_size,
            learning_rate: self.config.learning_rate,
            patience: self.config.patience,
            seed: self.config.seed,
        };

        info!(
            "Trainer: Fitting {} on {} sequences ({} validation), {} epochs",
            model.name(),
            train.len(),
            test.len(),
            epochs
        );
        let started = Instant::now();
        let report = model.fit(train, Some(test), &schedule)?;

        info!(
            "Trainer: Finished after {} epochs in {:.1?} (final train_loss={:.6}, early_stop={})",
            report.epochs_run,
            started.elapsed(),
            report.train_loss.last().copied().unwrap_or(f64::NAN),
            report.stopped_early
        );

        Ok(TrainedModel { model, report })
    }

    fn validate_partitions(
        train: &SequenceTensors,
        test: &SequenceTensors,
    ) -> Result<(), PipelineError> {
        for (name, part) in [("train", train), ("test", test)] {
            if part.is_empty() {
                return Err(PipelineError::InsufficientData {
                    required: 1,
                    available: 0,
                });
            }
            if part.len() != part.targets.len() {
                return Err(PipelineError::invalid_data(format!(
                    "{} partition has {} sequences but {} targets",
                    name,
                    part.len(),
                    part.targets.len()
                )));
            }
        }

        if train.sequence_length() != test.sequence_length() || train.n_features() != test.n_features() {
            return Err(PipelineError::invalid_data(format!(
                "train sequences are {}x{} but test sequences are {}x{}",
                train.sequence_length(),
                train.n_features(),
                test.sequence_length(),
                test.n_features()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    fn tensors(n: usize, seq_len: usize, features: usize) -> SequenceTensors {
        SequenceTensors {
            inputs: Array3::from_shape_fn((n, seq_len, features), |(i, t, f)| {
                (i + t + f) as f64 / 10.0
            }),
            targets: Array1::from_shape_fn(n, |i| i as f64 / 10.0),
        }
    }

    fn trainer() -> Trainer {
        Trainer::new(TrainerConfig {
            hidden_size: 4,
            batch_size: 4,
            ..TrainerConfig::default()
        })
    }

    #[test]
    fn test_epoch_bounds() {
        let (train, test) = (tensors(8, 3, 5), tensors(4, 3, 5));
        for epochs in [0, 1001] {
            let err = trainer().train(&train, &test, epochs).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidParameter { name: "epochs", .. }));
        }
        let trained = trainer().train(&train, &test, 2).unwrap();
        assert_eq!(trained.report.epochs_run, 2);
        assert_eq!(trained.model.config().input_size, 5);
    }

    #[test]
    fn test_empty_partition_is_insufficient_data() {
        let err = trainer()
            .train(&tensors(8, 3, 5), &tensors(0, 3, 5), 1)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }

    #[test]
    fn test_mismatched_targets_rejected() {
        let mut train = tensors(8, 3, 5);
        train.targets = Array1::zeros(7);
        let err = trainer().train(&train, &tensors(4, 3, 5), 1).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidData { .. }));
    }

    #[test]
    fn test_mismatched_window_shape_rejected() {
        let err = trainer()
            .train(&tensors(8, 3, 5), &tensors(4, 4, 5), 1)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidData { .. }));
    }

    #[test]
    fn test_validation_loss_tracked_per_epoch() {
        let trained = trainer().train(&tensors(8, 3, 5), &tensors(4, 3, 5), 3).unwrap();
        assert_eq!(trained.report.validation_loss.len(), 3);
    }
}
