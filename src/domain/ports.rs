use crate::domain::errors::PipelineError;
use crate::domain::ml::frame::MarketFrame;
use crate::domain::ml::request::HistoryRange;
use async_trait::async_trait;

/// Source of historical daily bars.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Returns rows for `ticker` with at least a timestamp and the OHLCV
    /// columns. Row order is whatever the source delivers.
    async fn fetch_history(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> Result<MarketFrame, PipelineError>;

    fn name(&self) -> &str;
}

/// Serialized artifacts of one trained model.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBlobs {
    pub model: Vec<u8>,
    /// Absent when the model was trained without scaling.
    pub scaler: Option<Vec<u8>>,
    pub metadata: Vec<u8>,
}

/// Where a `put` placed each blob.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredArtifacts {
    pub id: String,
    pub model_path: String,
    pub scaler_path: Option<String>,
    pub metadata_path: String,
}

/// Keyed blob storage for trained models.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persists the blobs under a fresh unique identifier.
    async fn put(&self, blobs: ArtifactBlobs) -> Result<StoredArtifacts, PipelineError>;

    /// Retrieves the blobs stored under `id`. A missing model or metadata
    /// blob is `ArtifactNotFound`; a missing scaler is not an error.
    async fn get(&self, id: &str) -> Result<ArtifactBlobs, PipelineError>;
}
