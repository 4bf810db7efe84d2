//! Request-level orchestration of training, prediction and data fetching.

use crate::application::ml::evaluator::{Evaluation, Evaluator};
use crate::application::ml::predict_prepare::InferencePreparePipeline;
use crate::application::ml::predictor::Predictor;
use crate::application::ml::preprocess::{Preprocessor, RowRequirement};
use crate::application::ml::train_prepare::{PreparedDatasets, TrainPrepareConfig, TrainPreparePipeline};
use crate::application::ml::trainer::{TrainedModel, Trainer, TrainerConfig};
use crate::domain::errors::PipelineError;
use crate::domain::ml::frame::MarketFrame;
use crate::domain::ml::metrics::RegressionMetrics;
use crate::domain::ml::model::{SequenceRegressor, TrainingReport};
use crate::domain::ml::request::{HistoryRange, ModelMetadata, TrainRequest};
use crate::domain::ml::scaler::{FeatureScaler, ScalerState, ScalingMethod};
use crate::domain::ports::{ArtifactBlobs, ArtifactStore, MarketDataProvider, StoredArtifacts};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful training request.
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub id: String,
    pub train_metrics: RegressionMetrics,
    pub test_metrics: RegressionMetrics,
    pub artifacts: StoredArtifacts,
    pub report: TrainingReport,
}

/// A model that has been trained and scored but not yet persisted.
struct EvaluatedRun {
    trained: TrainedModel,
    scaler: FeatureScaler,
    evaluation: Evaluation,
}

pub struct ModelService {
    market_data: Arc<dyn MarketDataProvider>,
    store: Arc<dyn ArtifactStore>,
    trainer: TrainerConfig,
    scaling: ScalingMethod,
}

impl ModelService {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        store: Arc<dyn ArtifactStore>,
        trainer: TrainerConfig,
        scaling: ScalingMethod,
    ) -> Self {
        Self {
            market_data,
            store,
            trainer,
            scaling,
        }
    }

    /// Fetches history, trains and evaluates a model, then persists it.
    ///
    /// Training runs on the calling task. Nothing is written to the store
    /// unless evaluation succeeded.
    pub async fn train(&self, request: TrainRequest) -> Result<TrainOutcome, PipelineError> {
        request.validate()?;
        info!(
            "ModelService: Training request for {} ({} to {}, sequence_length={}, epochs={})",
            request.ticker, request.start_date, request.end_date, request.sequence_length, request.epochs
        );

        let frame = self
            .market_data
            .fetch_history(&request.ticker, request.history_range())
            .await?;
        info!(
            "ModelService: Fetched {} rows for {} from {}",
            frame.len(),
            request.ticker,
            self.market_data.name()
        );

        let run = self.train_and_evaluate(&request, frame)?;
        let blobs = self.serialize(&request, &run)?;
        let artifacts = self.store.put(blobs).await?;

        info!("ModelService: Stored model {} at {}", artifacts.id, artifacts.model_path);

        Ok(TrainOutcome {
            id: artifacts.id.clone(),
            train_metrics: run.evaluation.train,
            test_metrics: run.evaluation.test,
            artifacts,
            report: run.trained.report,
        })
    }

    fn train_and_evaluate(
        &self,
        request: &TrainRequest,
        frame: MarketFrame,
    ) -> Result<EvaluatedRun, PipelineError> {
        let table = Preprocessor::new(RowRequirement::training()).clean(frame)?;

        let pipeline = TrainPreparePipeline::new(TrainPrepareConfig {
            train_size: request.train_size,
            sequence_length: request.sequence_length,
            target_column: request.target_column.clone(),
            scaling: self.scaling,
        })?;
        let PreparedDatasets { train, test, scaler } = pipeline.execute(table)?;

        let trained = Trainer::new(self.trainer).train(&train, &test, request.epochs)?;
        let evaluation = Evaluator::evaluate(&trained.model, &train, &test)?;

        Ok(EvaluatedRun {
            trained,
            scaler,
            evaluation,
        })
    }

    fn serialize(
        &self,
        request: &TrainRequest,
        run: &EvaluatedRun,
    ) -> Result<ArtifactBlobs, PipelineError> {
        let metadata = ModelMetadata::new(
            request.clone(),
            run.evaluation.train,
            run.evaluation.test,
            run.scaler.method(),
            run.trained.model.name(),
        );

        let scaler = match run.scaler.state() {
            Some(state) => Some(serde_json::to_vec(state)?),
            None => None,
        };

        Ok(ArtifactBlobs {
            model: run.trained.model.to_json()?,
            scaler,
            metadata: serde_json::to_vec_pretty(&metadata)?,
        })
    }

    /// Predicts with a stored model on the most recent bars of its ticker.
    pub async fn predict(&self, model_id: &str) -> Result<Vec<f64>, PipelineError> {
        let blobs = self.store.get(model_id).await?;
        let metadata: ModelMetadata = serde_json::from_slice(&blobs.metadata)?;
        let scaler = Self::restore_scaler(model_id, metadata.scaler, blobs.scaler.as_deref())?;
        let predictor = Predictor::from_blob(&blobs.model)?;

        let pipeline = InferencePreparePipeline::new(metadata.request.sequence_length, scaler)?;
        let windows = pipeline
            .prepare(self.market_data.as_ref(), &metadata.request.ticker)
            .await?;

        let predictions = predictor.predict(windows.view())?;
        info!(
            "ModelService: Model {} produced {} predictions for {}",
            model_id,
            predictions.len(),
            metadata.request.ticker
        );
        Ok(predictions)
    }

    fn restore_scaler(
        model_id: &str,
        method: ScalingMethod,
        blob: Option<&[u8]>,
    ) -> Result<FeatureScaler, PipelineError> {
        match (method, blob) {
            (ScalingMethod::Identity, None) => Ok(FeatureScaler::Identity),
            (ScalingMethod::Identity, Some(_)) => {
                warn!(
                    "ModelService: Model {} was trained without scaling; ignoring stored scaler",
                    model_id
                );
                Ok(FeatureScaler::Identity)
            }
            (method, None) => Err(PipelineError::NotFitted {
                reason: format!(
                    "model {} was trained with {} scaling but no scaler is stored",
                    model_id, method
                ),
            }),
            (method, Some(bytes)) => {
                let state: ScalerState = serde_json::from_slice(bytes)?;
                if state.method() != method {
                    return Err(PipelineError::Serialization {
                        reason: format!(
                            "stored scaler is {} but metadata records {}",
                            state.method(),
                            method
                        ),
                    });
                }
                Ok(FeatureScaler::Fitted(state))
            }
        }
    }

    pub async fn fetch_data(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> Result<MarketFrame, PipelineError> {
        if ticker.trim().is_empty() {
            return Err(PipelineError::invalid_parameter("ticker", "must not be empty"));
        }
        range.validate()?;
        self.market_data.fetch_history(ticker, range).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_scaler_with_recorded_method_is_not_fitted() {
        let err = ModelService::restore_scaler("m1", ScalingMethod::MinMax, None).unwrap_err();
        assert!(matches!(err, PipelineError::NotFitted { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_identity_metadata_passes_through() {
        let scaler = ModelService::restore_scaler("m1", ScalingMethod::Identity, None).unwrap();
        assert_eq!(scaler, FeatureScaler::Identity);
    }

    #[test]
    fn test_stored_scaler_must_match_metadata() {
        let state = ScalerState::Standard {
            mean: vec![0.0],
            scale: vec![1.0],
        };
        let bytes = serde_json::to_vec(&state).unwrap();

        let restored =
            ModelService::restore_scaler("m1", ScalingMethod::Standard, Some(&bytes)).unwrap();
        assert_eq!(restored, FeatureScaler::Fitted(state));

        let err = ModelService::restore_scaler("m1", ScalingMethod::MinMax, Some(&bytes)).unwrap_err();
        assert!(matches!(err, PipelineError::Serialization { .. }));
    }
}
