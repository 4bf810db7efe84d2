use super::feature_schema::{FEATURE_COLUMNS, MAX_EPOCHS, feature_index};
use super::metrics::RegressionMetrics;
use super::scaler::ScalingMethod;
use crate::domain::errors::PipelineError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which slice of history to fetch from the market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    /// Daily bars with `start <= date < end`.
    Between { start: NaiveDate, end: NaiveDate },
    /// The most recent `n` daily bars.
    LastRows(usize),
}

impl HistoryRange {
    pub fn validate(&self) -> Result<(), PipelineError> {
        match self {
            Self::Between { start, end } if start >= end => Err(PipelineError::invalid_parameter(
                "start_date",
                format!("start date {} must be earlier than end date {}", start, end),
            )),
            Self::LastRows(0) => Err(PipelineError::invalid_parameter(
                "days",
                "must be a positive integer",
            )),
            _ => Ok(()),
        }
    }
}

/// Parameters of a training run, stored verbatim in the model metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub train_size: f64,
    pub sequence_length: usize,
    pub target_column: String,
    pub epochs: usize,
}

impl TrainRequest {
    pub fn history_range(&self) -> HistoryRange {
        HistoryRange::Between {
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// Checks everything that can be checked before any data is fetched.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.ticker.trim().is_empty() {
            return Err(PipelineError::invalid_parameter("ticker", "must not be empty"));
        }
        self.history_range().validate()?;
        if !(self.train_size > 0.0 && self.train_size < 1.0) {
            return Err(PipelineError::invalid_parameter(
                "train_size",
                format!("must be between 0 and 1 (exclusive), got {}", self.train_size),
            ));
        }
        if self.sequence_length == 0 {
            return Err(PipelineError::invalid_parameter(
                "sequence_length",
                "must be greater than 0",
            ));
        }
        validate_epochs(self.epochs)?;
        feature_index(&self.target_column)?;
        Ok(())
    }
}

pub fn validate_epochs(epochs: usize) -> Result<(), PipelineError> {
    if epochs == 0 {
        return Err(PipelineError::invalid_parameter(
            "epochs",
            "number of epochs must be greater than 0",
        ));
    }
    if epochs > MAX_EPOCHS {
        return Err(PipelineError::invalid_parameter(
            "epochs",
            format!("number of epochs must not exceed {}", MAX_EPOCHS),
        ));
    }
    Ok(())
}

/// Everything needed to rebuild the prediction inputs for a stored model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub request: TrainRequest,
    pub train_metrics: RegressionMetrics,
    pub test_metrics: RegressionMetrics,
    pub scaler: ScalingMethod,
    pub model: String,
    pub feature_columns: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ModelMetadata {
    pub fn new(
        request: TrainRequest,
        train_metrics: RegressionMetrics,
        test_metrics: RegressionMetrics,
        scaler: ScalingMethod,
        model: impl Into<String>,
    ) -> Self {
        Self {
            request,
            train_metrics,
            test_metrics,
            scaler,
            model: model.into(),
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            created_at: Utc::now(),
        }
    }
}
