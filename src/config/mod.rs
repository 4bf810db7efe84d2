//! Configuration module for stockcast.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: market data, artifact storage and training.

mod market_data_config;
mod storage_config;
mod training_config;

pub use market_data_config::{AlpacaDataConfig, MarketDataEnvConfig, MarketDataSource};
pub use storage_config::StorageEnvConfig;
pub use training_config::TrainingEnvConfig;

use anyhow::{Context, Result};

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub market_data: MarketDataEnvConfig,
    pub storage: StorageEnvConfig,
    pub training: TrainingEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            market_data: MarketDataEnvConfig::from_env()
                .context("Failed to load market data config")?,
            storage: StorageEnvConfig::from_env(),
            training: TrainingEnvConfig::from_env().context("Failed to load training config")?,
        })
    }
}
