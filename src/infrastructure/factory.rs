use crate::config::{Config, MarketDataSource};
use crate::domain::ports::{ArtifactStore, MarketDataProvider};
use crate::infrastructure::alpaca::AlpacaHistoricalProvider;
use crate::infrastructure::csv_market_data::CsvMarketDataProvider;
use crate::infrastructure::mock::SyntheticMarketDataProvider;
use crate::infrastructure::persistence::{ArtifactStoreConfig, FileArtifactStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub struct ServiceFactory;

impl ServiceFactory {
    pub fn create_market_data(config: &Config) -> Result<Arc<dyn MarketDataProvider>> {
        let market_data = &config.market_data;
        let provider: Arc<dyn MarketDataProvider> = match market_data.source {
            MarketDataSource::Alpaca => Arc::new(
                AlpacaHistoricalProvider::builder()
                    .api_key(market_data.alpaca.api_key.clone())
                    .api_secret(market_data.alpaca.secret_key.clone())
                    .data_base_url(market_data.alpaca.data_url.clone())
                    .build()
                    .context("Failed to configure Alpaca market data (set ALPACA_API_KEY and ALPACA_SECRET_KEY)")?,
            ),
            MarketDataSource::Csv => Arc::new(CsvMarketDataProvider::new(&market_data.csv_dir)),
            MarketDataSource::Synthetic => Arc::new(SyntheticMarketDataProvider::new(
                market_data.synthetic_rows,
                market_data.synthetic_seed,
            )),
        };

        info!("ServiceFactory: Using {} market data provider", provider.name());
        Ok(provider)
    }

    pub fn create_artifact_store(config: &Config) -> Arc<dyn ArtifactStore> {
        Arc::new(FileArtifactStore::new(ArtifactStoreConfig {
            root: config.storage.artifact_root.clone(),
        }))
    }
}
