//! Training hyperparameter configuration parsing from environment variables.
//!
//! Everything here is fixed per process; per-request values (sequence
//! length, split, epochs) arrive with the request itself.

use crate::application::ml::trainer::TrainerConfig;
use crate::domain::ml::scaler::ScalingMethod;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct TrainingEnvConfig {
    pub hidden_size: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// `None` disables early stopping
    pub patience: Option<usize>,
    pub seed: u64,
    pub scaling: ScalingMethod,
}

impl TrainingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let hidden_size = Self::parse_usize("LSTM_HIDDEN_SIZE", 64)?;
        let batch_size = Self::parse_usize("TRAIN_BATCH_SIZE", 32)?;
        if hidden_size == 0 || batch_size == 0 {
            anyhow::bail!("LSTM_HIDDEN_SIZE and TRAIN_BATCH_SIZE must be greater than 0");
        }

        let learning_rate = env::var("LSTM_LEARNING_RATE")
            .unwrap_or_else(|_| "0.001".to_string())
            .parse::<f64>()
            .context("Failed to parse LSTM_LEARNING_RATE")?;
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            anyhow::bail!("LSTM_LEARNING_RATE must be a positive number");
        }

        // 0 or unset means train for the full epoch budget
        let patience = match Self::parse_usize("EARLY_STOPPING_PATIENCE", 0)? {
            0 => None,
            n => Some(n),
        };

        let seed = env::var("TRAIN_SEED")
            .unwrap_or_else(|_| "42".to_string())
            .parse::<u64>()
            .context("Failed to parse TRAIN_SEED")?;

        let scaling_str = env::var("SCALING_METHOD").unwrap_or_else(|_| "minmax".to_string());
        let scaling = ScalingMethod::from_str(&scaling_str)
            .map_err(|e| anyhow::anyhow!("Invalid SCALING_METHOD: {}", e))?;

        Ok(Self {
            hidden_size,
            learning_rate,
            batch_size,
            patience,
            seed,
            scaling,
        })
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            hidden_size: self.hidden_size,
            learning_rate: self.learning_rate,
            batch_size: self.batch_size,
            patience: self.patience,
            seed: self.seed,
            ..TrainerConfig::default()
        }
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }
}
