use super::preprocess::{Preprocessor, RowRequirement};
use crate::domain::errors::PipelineError;
use crate::domain::ml::frame::MarketFrame;
use crate::domain::ml::request::HistoryRange;
use crate::domain::ml::scaler::FeatureScaler;
use crate::domain::ml::sequence::SequenceBuilder;
use crate::domain::ports::MarketDataProvider;
use ndarray::Array3;
use tracing::info;

/// Rebuilds model inputs for a stored model from the most recent bars.
///
/// The scaler is the one persisted at training time and is only ever used
/// through `transform`.
pub struct InferencePreparePipeline {
    builder: SequenceBuilder,
    scaler: FeatureScaler,
}

impl InferencePreparePipeline {
    pub fn new(sequence_length: usize, scaler: FeatureScaler) -> Result<Self, PipelineError> {
        Ok(Self {
            builder: SequenceBuilder::new(sequence_length)?,
            scaler,
        })
    }

    /// Fetches the last `sequence_length` rows for `ticker` and prepares them.
    pub async fn prepare(
        &self,
        provider: &dyn MarketDataProvider,
        ticker: &str,
    ) -> Result<Array3<f64>, PipelineError> {
        let range = HistoryRange::LastRows(self.builder.sequence_length());
        let frame = provider.fetch_history(ticker, range).await?;
        self.execute(frame)
    }

    pub fn execute(&self, frame: MarketFrame) -> Result<Array3<f64>, PipelineError> {
        let sequence_length = self.builder.sequence_length();
        let table = Preprocessor::new(RowRequirement::AtLeast(sequence_length)).clean(frame)?;
        let ordered = table.into_date_ordered()?;

        let scaled = self.scaler.transform(ordered.features)?;
        let windows = self.builder.inference_windows(scaled.view())?;

        info!(
            "InferencePreparePipeline: Built {} inference windows of length {}",
            windows.shape()[0],
            sequence_length
        );
        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::frame::Column;
    use crate::domain::ml::scaler::ScalingMethod;
    use ndarray::array;

    fn frame(rows: usize) -> MarketFrame {
        // Newest first, like some providers deliver.
        let days: Vec<i64> = (0..rows as i64).rev().collect();
        let col = |base: f64| days.iter().map(|d| Some(base + *d as f64)).collect();
        MarketFrame::new(
            days.iter().map(|d| d * 86_400_000).collect(),
            vec![
                Column::new("Open", col(10.0)),
                Column::new("High", col(12.0)),
                Column::new("Low", col(8.0)),
                Column::new("Close", col(11.0)),
                Column::new("Volume", col(1000.0)),
                Column::new("Dividends", vec![Some(0.0); rows]),
            ],
        )
        .unwrap()
    }

    fn fitted_scaler() -> FeatureScaler {
        let mut scaler = FeatureScaler::new(ScalingMethod::MinMax);
        scaler
            .fit_transform(array![
                [10.0, 12.0, 8.0, 11.0, 1000.0],
                [20.0, 22.0, 18.0, 21.0, 1010.0]
            ])
            .unwrap();
        scaler
    }

    #[test]
    fn test_exactly_sequence_length_rows_gives_one_window() {
        let pipeline = InferencePreparePipeline::new(10, fitted_scaler()).unwrap();
        let windows = pipeline.execute(frame(10)).unwrap();

        assert_eq!(windows.shape(), &[1, 10, 5]);
        // Sorted ascending and scaled with the stored parameters.
        assert_eq!(windows[[0, 0, 0]], 0.0);
        assert!((windows[[0, 9, 0]] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_extra_rows_give_sliding_windows() {
        let pipeline = InferencePreparePipeline::new(10, fitted_scaler()).unwrap();
        let windows = pipeline.execute(frame(14)).unwrap();
        assert_eq!(windows.shape(), &[5, 10, 5]);
    }

    #[test]
    fn test_too_few_rows_is_insufficient_data() {
        let pipeline = InferencePreparePipeline::new(10, fitted_scaler()).unwrap();
        let err = pipeline.execute(frame(5)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData {
                required: 10,
                available: 5
            }
        ));
    }

    #[test]
    fn test_unfitted_scaler_is_rejected() {
        let pipeline =
            InferencePreparePipeline::new(3, FeatureScaler::new(ScalingMethod::Standard)).unwrap();
        let err = pipeline.execute(frame(3)).unwrap_err();
        assert!(matches!(err, PipelineError::NotFitted { .. }));
    }

    #[test]
    fn test_identity_scaler_passes_raw_prices() {
        let pipeline = InferencePreparePipeline::new(3, FeatureScaler::Identity).unwrap();
        let windows = pipeline.execute(frame(3)).unwrap();
        assert_eq!(windows[[0, 2, 3]], 13.0);
    }
}
