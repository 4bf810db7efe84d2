use crate::domain::errors::PipelineError;
use crate::domain::ml::metrics::RegressionMetrics;
use crate::domain::ml::model::SequenceRegressor;
use crate::domain::ml::sequence::SequenceTensors;
use tracing::info;

/// Metrics of a trained model on both partitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
}

/// Scores a trained model with inference-only forward passes.
pub struct Evaluator;

impl Evaluator {
    pub fn evaluate(
        model: &dyn SequenceRegressor,
        train: &SequenceTensors,
        test: &SequenceTensors,
    ) -> Result<Evaluation, PipelineError> {
        let train_metrics = Self::score(model, train)?;
        let test_metrics = Self::score(model, test)?;

        info!(
            "Evaluator: train rmse={:.4} r2={:.4} | test rmse={:.4} r2={:.4}",
            train_metrics.rmse, train_metrics.r2, test_metrics.rmse, test_metrics.r2
        );

        Ok(Evaluation {
            train: train_metrics,
            test: test_metrics,
        })
    }

    pub fn score(
        model: &dyn SequenceRegressor,
        data: &SequenceTensors,
    ) -> Result<RegressionMetrics, PipelineError> {
        let predictions = model.predict(data.inputs.view())?;
        RegressionMetrics::compute(data.targets.view(), predictions.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::model::{TrainingReport, TrainingSchedule};
    use ndarray::{Array1, Array3, ArrayView3, Axis};

    /// Predicts the last value of the first feature.
    struct LastValue;

    impl SequenceRegressor for LastValue {
        fn fit(
            &mut self,
            _train: &SequenceTensors,
            _validation: Option<&SequenceTensors>,
            _schedule: &TrainingSchedule,
        ) -> Result<TrainingReport, PipelineError> {
            unreachable!("evaluation never trains")
        }

        fn predict(&self, inputs: ArrayView3<f64>) -> Result<Array1<f64>, PipelineError> {
            let last = inputs.shape()[1] - 1;
            Ok(inputs.index_axis(Axis(1), last).column(0).to_owned())
        }

        fn name(&self) -> &str {
            "last_value"
        }
    }

    fn tensors(values: &[f64], targets: &[f64]) -> SequenceTensors {
        let inputs = Array3::from_shape_fn((values.len(), 2, 1), |(i, _, _)| values[i]);
        SequenceTensors {
            inputs,
            targets: Array1::from(targets.to_vec()),
        }
    }

    #[test]
    fn test_perfect_predictions() {
        let data = tensors(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        let eval = Evaluator::evaluate(&LastValue, &data, &data).unwrap();
        assert_eq!(eval.train.mae, 0.0);
        assert_eq!(eval.test.r2, 1.0);
    }

    #[test]
    fn test_partitions_scored_independently() {
        let train = tensors(&[1.0, 2.0], &[1.0, 2.0]);
        let test = tensors(&[1.0, 2.0], &[2.0, 3.0]);
        let eval = Evaluator::evaluate(&LastValue, &train, &test).unwrap();

        assert_eq!(eval.train.rmse, 0.0);
        assert_eq!(eval.test.mae, 1.0);
        assert_eq!(eval.test.rmse, 1.0);
    }

    #[test]
    fn test_empty_partition_fails() {
        let data = SequenceTensors {
            inputs: Array3::zeros((0, 2, 1)),
            targets: Array1::zeros(0),
        };
        assert!(Evaluator::score(&LastValue, &data).is_err());
    }
}
