//! Market data configuration parsing from environment variables.
//!
//! Selects the history provider and carries the settings each provider needs.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Where historical bars come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataSource {
    Alpaca,
    Csv,
    Synthetic,
}

impl FromStr for MarketDataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alpaca" => Ok(MarketDataSource::Alpaca),
            "csv" => Ok(MarketDataSource::Csv),
            "synthetic" | "mock" => Ok(MarketDataSource::Synthetic),
            _ => anyhow::bail!(
                "Invalid MARKET_DATA_PROVIDER: {}. Must be 'alpaca', 'csv' or 'synthetic'",
                s
            ),
        }
    }
}

/// Alpaca market data API configuration
#[derive(Debug, Clone, Default)]
pub struct AlpacaDataConfig {
    pub api_key: String,
    pub secret_key: String,
    pub data_url: String,
}

impl AlpacaDataConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("ALPACA_API_KEY").unwrap_or_default(),
            secret_key: env::var("ALPACA_SECRET_KEY").unwrap_or_default(),
            data_url: env::var("ALPACA_DATA_URL")
                .unwrap_or_else(|_| "https://data.alpaca.markets".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketDataEnvConfig {
    pub source: MarketDataSource,
    pub alpaca: AlpacaDataConfig,
    pub csv_dir: PathBuf,
    /// Bars generated per request by the synthetic provider
    pub synthetic_rows: usize,
    pub synthetic_seed: u64,
}

impl MarketDataEnvConfig {
    pub fn from_env() -> Result<Self> {
        let source_str =
            env::var("MARKET_DATA_PROVIDER").unwrap_or_else(|_| "synthetic".to_string());

        Ok(Self {
            source: MarketDataSource::from_str(&source_str)?,
            alpaca: AlpacaDataConfig::from_env(),
            csv_dir: PathBuf::from(
                env::var("MARKET_DATA_CSV_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            synthetic_rows: env::var("SYNTHETIC_ROWS")
                .unwrap_or_else(|_| "500".to_string())
                .parse::<usize>()
                .context("Failed to parse SYNTHETIC_ROWS")?,
            synthetic_seed: env::var("SYNTHETIC_SEED")
                .unwrap_or_else(|_| "7".to_string())
                .parse::<u64>()
                .context("Failed to parse SYNTHETIC_SEED")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parsing() {
        assert_eq!(
            MarketDataSource::from_str("ALPACA").unwrap(),
            MarketDataSource::Alpaca
        );
        assert_eq!(
            MarketDataSource::from_str("mock").unwrap(),
            MarketDataSource::Synthetic
        );
        assert!(MarketDataSource::from_str("yahoo").is_err());
    }
}
