use thiserror::Error;

/// Errors raised by the data preparation, training and prediction pipeline.
///
/// Every variant is raised at the point of detection and propagated
/// unchanged to the request boundary; the pipeline never recovers
/// partially from any of them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Schema error: {reason}")]
    Schema { reason: String },

    #[error("Invalid data: {reason}")]
    InvalidData { reason: String },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Scaler is not fitted: {reason}")]
    NotFitted { reason: String },

    #[error("Insufficient data: need at least {required} rows, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Artifact not found: {what} for model {id}")]
    ArtifactNotFound { id: String, what: String },

    #[error("Market data provider failed: {reason}")]
    MarketData { reason: String },

    #[error("Artifact storage failed: {reason}")]
    Storage { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

impl PipelineError {
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn invalid_data(reason: impl Into<String>) -> Self {
        Self::InvalidData {
            reason: reason.into(),
        }
    }

    pub fn schema(reason: impl Into<String>) -> Self {
        Self::Schema {
            reason: reason.into(),
        }
    }

    /// HTTP-like status used by the request boundary to report the failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Schema { .. } | Self::InvalidData { .. } | Self::InvalidParameter { .. } => 400,
            Self::InsufficientData { .. } | Self::ArtifactNotFound { .. } => 404,
            Self::NotFitted { .. }
            | Self::MarketData { .. }
            | Self::Storage { .. }
            | Self::Serialization { .. } => 500,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
