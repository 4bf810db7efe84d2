//! Artifact storage configuration parsing from environment variables.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StorageEnvConfig {
    /// Directory under which trained models are written
    pub artifact_root: PathBuf,
}

impl Default for StorageEnvConfig {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from("artifacts"),
        }
    }
}

impl StorageEnvConfig {
    pub fn from_env() -> Self {
        Self {
            artifact_root: env::var("ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::default().artifact_root),
        }
    }
}
