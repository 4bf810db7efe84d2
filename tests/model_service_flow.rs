use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use stockcast::application::ml::trainer::TrainerConfig;
use stockcast::application::model_service::ModelService;
use stockcast::domain::errors::PipelineError;
use stockcast::domain::ml::request::{HistoryRange, TrainRequest};
use stockcast::domain::ml::scaler::ScalingMethod;
use stockcast::domain::ports::{ArtifactStore, MarketDataProvider};
use stockcast::infrastructure::mock::SyntheticMarketDataProvider;
use stockcast::infrastructure::persistence::{ArtifactStoreConfig, FileArtifactStore};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

fn temp_root() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!(
        "stockcast_flow_{}_{}_{}",
        std::process::id(),
        nanos,
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ))
}

fn last_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
}

fn provider(rows: usize) -> Arc<dyn MarketDataProvider> {
    Arc::new(SyntheticMarketDataProvider::new(rows, 11).with_last_day(last_day()))
}

fn store(root: &PathBuf) -> Arc<dyn ArtifactStore> {
    Arc::new(FileArtifactStore::new(ArtifactStoreConfig { root: root.clone() }))
}

fn small_trainer() -> TrainerConfig {
    TrainerConfig {
        hidden_size: 4,
        learning_rate: 0.01,
        batch_size: 32,
        ..TrainerConfig::default()
    }
}

fn request(epochs: usize) -> TrainRequest {
    TrainRequest {
        ticker: "AAPL".to_string(),
        start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        train_size: 0.8,
        sequence_length: 10,
        target_column: "Close".to_string(),
        epochs,
    }
}

#[tokio::test]
async fn test_train_then_predict_round_trip() -> anyhow::Result<()> {
    init_logging();
    let root = temp_root();
    let service = ModelService::new(provider(251), store(&root), small_trainer(), ScalingMethod::MinMax);

    let outcome = service.train(request(3)).await?;

    assert_eq!(outcome.report.epochs_run, 3);
    assert!(outcome.train_metrics.rmse.is_finite());
    assert!(outcome.test_metrics.mae.is_finite());
    assert!(outcome.artifacts.model_path.starts_with("file://"));
    assert!(outcome.artifacts.scaler_path.is_some());

    // The stored model is reloaded from disk and fed the newest 10 bars.
    let predictions = service.predict(&outcome.id).await?;
    assert_eq!(predictions.len(), 1);
    assert!(predictions[0].is_finite());

    // Prediction is deterministic for the same stored model and data.
    let again = service.predict(&outcome.id).await?;
    assert_eq!(predictions, again);

    std::fs::remove_dir_all(root).ok();
    Ok(())
}

#[tokio::test]
async fn test_identity_scaling_stores_no_scaler() -> anyhow::Result<()> {
    init_logging();
    let root = temp_root();
    let service = ModelService::new(provider(251), store(&root), small_trainer(), ScalingMethod::Identity);

    let outcome = service.train(request(2)).await?;
    assert!(outcome.artifacts.scaler_path.is_none());

    let blobs = store(&root).get(&outcome.id).await?;
    assert!(blobs.scaler.is_none());

    let predictions = service.predict(&outcome.id).await?;
    assert_eq!(predictions.len(), 1);

    std::fs::remove_dir_all(root).ok();
    Ok(())
}

#[tokio::test]
async fn test_predict_with_too_little_history_is_insufficient_data() -> anyhow::Result<()> {
    init_logging();
    let root = temp_root();
    let trainer = ModelService::new(provider(251), store(&root), small_trainer(), ScalingMethod::Standard);
    let outcome = trainer.train(request(1)).await?;

    let starved = ModelService::new(provider(5), store(&root), small_trainer(), ScalingMethod::Standard);
    let err = starved.predict(&outcome.id).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::InsufficientData {
            required: 10,
            available: 5
        }
    ));
    assert_eq!(err.status_code(), 404);

    std::fs::remove_dir_all(root).ok();
    Ok(())
}

#[tokio::test]
async fn test_training_with_too_few_rows_stores_nothing() {
    init_logging();
    let root = temp_root();
    let service = ModelService::new(provider(150), store(&root), small_trainer(), ScalingMethod::MinMax);

    let err = service.train(request(1)).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidData { .. }));
    assert_eq!(err.status_code(), 400);

    let stored = std::fs::read_dir(root.join("models"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(stored, 0);

    std::fs::remove_dir_all(root).ok();
}

#[tokio::test]
async fn test_epoch_bounds() {
    init_logging();
    let root = temp_root();
    let service = ModelService::new(provider(251), store(&root), small_trainer(), ScalingMethod::MinMax);

    for epochs in [0, 1001] {
        let err = service.train(request(epochs)).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { name: "epochs", .. }));
        assert_eq!(err.status_code(), 400);
    }
    assert!(request(500).validate().is_ok());
    assert!(request(1000).validate().is_ok());

    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_unknown_model_is_not_found() {
    let root = temp_root();
    let service = ModelService::new(provider(251), store(&root), small_trainer(), ScalingMethod::MinMax);

    tokio_test::block_on(async {
        let missing = uuid::Uuid::new_v4().to_string();
        let err = service.predict(&missing).await.unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
        assert_eq!(err.status_code(), 404);

        let err = service.predict("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    });
}

#[tokio::test]
async fn test_fetch_data_ranges() -> anyhow::Result<()> {
    let root = temp_root();
    let service = ModelService::new(provider(60), store(&root), small_trainer(), ScalingMethod::MinMax);

    let frame = service.fetch_data("MSFT", HistoryRange::LastRows(20)).await?;
    assert_eq!(frame.len(), 20);

    let err = service.fetch_data("  ", HistoryRange::LastRows(20)).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidParameter { name: "ticker", .. }));

    let backwards = HistoryRange::Between {
        start: last_day(),
        end: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    };
    let err = service.fetch_data("MSFT", backwards).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = service.fetch_data("MSFT", HistoryRange::LastRows(0)).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    Ok(())
}
