use super::lstm_regressor::LstmRegressor;
use crate::domain::errors::PipelineError;
use crate::domain::ml::model::SequenceRegressor;
use ndarray::ArrayView3;
use tracing::info;

/// Serves predictions from a restored model. Never trains.
pub struct Predictor {
    model: Box<dyn SequenceRegressor>,
}

impl Predictor {
    pub fn new(model: Box<dyn SequenceRegressor>) -> Self {
        Self { model }
    }

    /// Restores a serialized LSTM model.
    pub fn from_blob(bytes: &[u8]) -> Result<Self, PipelineError> {
        let model = LstmRegressor::from_json(bytes)?;
        info!(
            "Predictor: Loaded {} model ({} features, hidden size {})",
            model.name(),
            model.config().input_size,
            model.config().hidden_size
        );
        Ok(Self::new(Box::new(model)))
    }

    /// One prediction per window, in window order.
    pub fn predict(&self, windows: ArrayView3<f64>) -> Result<Vec<f64>, PipelineError> {
        Ok(self.model.predict(windows)?.to_vec())
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::lstm_regressor::LstmConfig;
    use ndarray::Array3;

    #[test]
    fn test_restored_model_predicts_like_trained() {
        let model = LstmRegressor::new(LstmConfig::new(5, 4)).unwrap();
        let windows = Array3::from_shape_fn((3, 10, 5), |(i, t, f)| (i * t + f) as f64 / 50.0);
        let expected = model.predict(windows.view()).unwrap().to_vec();

        let predictor = Predictor::from_blob(&model.to_json().unwrap()).unwrap();
        assert_eq!(predictor.predict(windows.view()).unwrap(), expected);
        assert_eq!(predictor.name(), "lstm");
    }

    #[test]
    fn test_corrupt_blob_is_serialization_error() {
        let err = Predictor::from_blob(b"{not json").err().unwrap();
        assert!(matches!(err, PipelineError::Serialization { .. }));
    }
}
