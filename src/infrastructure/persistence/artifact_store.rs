use crate::domain::errors::PipelineError;
use crate::domain::ports::{ArtifactBlobs, ArtifactStore, StoredArtifacts};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

const MODEL_FILE: &str = "model.json";
const SCALER_FILE: &str = "scaler.json";
const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone)]
pub struct ArtifactStoreConfig {
    pub root: PathBuf,
}

/// Stores each model under `{root}/models/{id}/`.
pub struct FileArtifactStore {
    models_dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(config: ArtifactStoreConfig) -> Self {
        Self {
            models_dir: config.root.join("models"),
        }
    }

    fn model_dir(&self, id: &str) -> Result<PathBuf, PipelineError> {
        // Ids are always UUIDs; anything else cannot name a stored model.
        Uuid::parse_str(id).map_err(|_| PipelineError::ArtifactNotFound {
            id: id.to_string(),
            what: "model".to_string(),
        })?;
        Ok(self.models_dir.join(id))
    }

    /// Atomic write: temp file then rename.
    async fn write_blob(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, PipelineError> {
        let path = dir.join(name);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes)
            .await
            .map_err(|e| storage_error(&temp_path, e))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| storage_error(&path, e))?;
        Ok(path)
    }

    async fn write_all(&self, dir: &Path, blobs: &ArtifactBlobs) -> Result<(PathBuf, Option<PathBuf>, PathBuf), PipelineError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| storage_error(dir, e))?;

        let model = Self::write_blob(dir, MODEL_FILE, &blobs.model).await?;
        let scaler = match &blobs.scaler {
            Some(bytes) => Some(Self::write_blob(dir, SCALER_FILE, bytes).await?),
            None => None,
        };
        // Metadata last: its presence marks a complete artifact.
        let metadata = Self::write_blob(dir, METADATA_FILE, &blobs.metadata).await?;
        Ok((model, scaler, metadata))
    }

    async fn read_blob(path: &Path) -> Result<Option<Vec<u8>>, PipelineError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(path, e)),
        }
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> PipelineError {
    PipelineError::Storage {
        reason: format!("{}: {}", path.display(), err),
    }
}

async fn file_uri(path: &Path) -> String {
    let absolute = fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn put(&self, blobs: ArtifactBlobs) -> Result<StoredArtifacts, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let dir = self.models_dir.join(&id);

        let (model, scaler, metadata) = match self.write_all(&dir, &blobs).await {
            Ok(paths) => paths,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                    warn!(
                        "FileArtifactStore: Failed to clean up partial artifact {}: {}",
                        id, cleanup
                    );
                }
                return Err(e);
            }
        };

        info!("FileArtifactStore: Saved model {} to {:?}", id, dir);

        Ok(StoredArtifacts {
            model_path: file_uri(&model).await,
            scaler_path: match scaler {
                Some(path) => Some(file_uri(&path).await),
                None => None,
            },
            metadata_path: file_uri(&metadata).await,
            id,
        })
    }

    async fn get(&self, id: &str) -> Result<ArtifactBlobs, PipelineError> {
        let dir = self.model_dir(id)?;
        let not_found = |what: &str| PipelineError::ArtifactNotFound {
            id: id.to_string(),
            what: what.to_string(),
        };

        let model = Self::read_blob(&dir.join(MODEL_FILE))
            .await?
            .ok_or_else(|| not_found("model"))?;
        let metadata = Self::read_blob(&dir.join(METADATA_FILE))
            .await?
            .ok_or_else(|| not_found("metadata"))?;
        let scaler = Self::read_blob(&dir.join(SCALER_FILE)).await?;

        info!("FileArtifactStore: Loaded model {} from {:?}", id, dir);
        Ok(ArtifactBlobs {
            model,
            scaler,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn store() -> (FileArtifactStore, PathBuf) {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!(
            "stockcast_store_{}_{}_{}",
            std::process::id(),
            nanos,
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        (
            FileArtifactStore::new(ArtifactStoreConfig { root: root.clone() }),
            root,
        )
    }

    fn blobs(scaler: Option<&[u8]>) -> ArtifactBlobs {
        ArtifactBlobs {
            model: b"{\"weights\":[1,2,3]}".to_vec(),
            scaler: scaler.map(|s| s.to_vec()),
            metadata: b"{\"ticker\":\"AAPL\"}".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let (store, root) = store();
        let stored = store.put(blobs(Some(b"{\"method\":\"min_max\"}"))).await.unwrap();

        assert!(Uuid::parse_str(&stored.id).is_ok());
        assert!(stored.model_path.starts_with("file://"));
        assert!(stored.model_path.ends_with(&format!("models/{}/model.json", stored.id)));
        assert!(stored.scaler_path.is_some());

        let loaded = store.get(&stored.id).await.unwrap();
        assert_eq!(loaded, blobs(Some(b"{\"method\":\"min_max\"}")));

        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn test_scaler_is_optional() {
        let (store, root) = store();
        let stored = store.put(blobs(None)).await.unwrap();
        assert!(stored.scaler_path.is_none());

        let loaded = store.get(&stored.id).await.unwrap();
        assert!(loaded.scaler.is_none());

        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn test_each_put_gets_a_fresh_id() {
        let (store, root) = store();
        let a = store.put(blobs(None)).await.unwrap();
        let b = store.put(blobs(None)).await.unwrap();
        assert_ne!(a.id, b.id);
        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (store, _root) = store();
        let err = store.get(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_malformed_id_is_not_found() {
        let (store, _root) = store();
        let err = store.get("../../etc").await.unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_metadata_is_not_found() {
        let (store, root) = store();
        let stored = store.put(blobs(None)).await.unwrap();
        std::fs::remove_file(root.join("models").join(&stored.id).join(METADATA_FILE)).unwrap();

        let err = store.get(&stored.id).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ArtifactNotFound { ref what, .. } if what == "metadata"
        ));
        std::fs::remove_dir_all(root).ok();
    }
}
