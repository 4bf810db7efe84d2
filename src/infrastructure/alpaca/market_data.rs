use super::common::{AlpacaBar, AlpacaBarsPage, bars_to_frame};
use crate::domain::errors::PipelineError;
use crate::domain::ml::frame::MarketFrame;
use crate::domain::ml::request::HistoryRange;
use crate::domain::ports::MarketDataProvider;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, error, info};

const DAILY_TIMEFRAME: &str = "1Day";
const PAGE_LIMIT: &str = "10000";

// ===== Historical daily bars (REST) =====

pub struct AlpacaHistoricalProvider {
    client: ClientWithMiddleware,
    api_key: String,
    api_secret: String,
    data_base_url: String,
}

impl AlpacaHistoricalProvider {
    pub fn builder() -> AlpacaHistoricalProviderBuilder {
        AlpacaHistoricalProviderBuilder::default()
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AlpacaBar>, PipelineError> {
        let url = format!("{}/v2/stocks/bars", self.data_base_url);
        let mut all_bars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query_params = vec![
                ("symbols", symbol.to_string()),
                ("start", start.to_rfc3339()),
                ("end", end.to_rfc3339()),
                ("timeframe", DAILY_TIMEFRAME.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("feed", "iex".to_string()),
            ];
            if let Some(token) = &page_token {
                query_params.push(("page_token", token.clone()));
            }

            debug!(
                "AlpacaHistoricalProvider: Fetching {} bars from {} to {} (page_token={:?})",
                symbol, start, end, page_token
            );

            let response = self
                .client
                .get(build_url_with_query(&url, &query_params))
                .header("APCA-API-KEY-ID", &self.api_key)
                .header("APCA-API-SECRET-KEY", &self.api_secret)
                .send()
                .await
                .map_err(|e| PipelineError::MarketData {
                    reason: format!("failed to fetch bars from Alpaca: {}", e),
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                error!(
                    "AlpacaHistoricalProvider: API error {} for {}: {}",
                    status, symbol, error_text
                );
                return Err(PipelineError::MarketData {
                    reason: format!("Alpaca API error ({}): {}", status, error_text),
                });
            }

            let mut page: AlpacaBarsPage =
                response.json().await.map_err(|e| PipelineError::MarketData {
                    reason: format!("failed to parse bars response: {}", e),
                })?;

            if let Some(bars) = page.bars.remove(symbol) {
                all_bars.extend(bars);
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(all_bars)
    }
}

/// `[start, end)` in UTC for a history request, relative to `now`.
///
/// Daily bars only exist on trading days, so `LastRows(n)` asks for a
/// calendar span comfortably wider than `n` sessions; the caller trims.
/// A lookback that does not fit the calendar is an `InvalidParameter`.
pub fn query_window(
    range: HistoryRange,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), PipelineError> {
    let midnight = |date: NaiveDate| date.and_time(NaiveTime::MIN).and_utc();
    match range {
        HistoryRange::Between { start, end } => Ok((midnight(start), midnight(end))),
        HistoryRange::LastRows(n) => {
            let out_of_range = || {
                PipelineError::invalid_parameter(
                    "days",
                    format!("{} trading days reach past the supported calendar", n),
                )
            };
            let calendar_days = i64::try_from(n)
                .ok()
                .and_then(|n| n.checked_mul(2))
                .and_then(|d| d.checked_add(14))
                .ok_or_else(out_of_range)?;
            let lookback = TimeDelta::try_days(calendar_days).ok_or_else(out_of_range)?;
            let start = now.checked_sub_signed(lookback).ok_or_else(out_of_range)?;
            Ok((start, now))
        }
    }
}

#[async_trait]
impl MarketDataProvider for AlpacaHistoricalProvider {
    async fn fetch_history(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> Result<MarketFrame, PipelineError> {
        range.validate()?;
        let (start, end) = query_window(range, Utc::now())?;
        let bars = self.fetch_bars(ticker, start, end).await?;
        info!(
            "AlpacaHistoricalProvider: Received {} daily bars for {}",
            bars.len(),
            ticker
        );

        let frame = bars_to_frame(&bars)?;
        Ok(match range {
            HistoryRange::LastRows(n) => frame.latest_rows(n),
            HistoryRange::Between { .. } => frame,
        })
    }

    fn name(&self) -> &str {
        "alpaca"
    }
}

#[derive(Default)]
pub struct AlpacaHistoricalProviderBuilder {
    api_key: Option<String>,
    api_secret: Option<String>,
    data_base_url: Option<String>,
}

impl AlpacaHistoricalProviderBuilder {
    pub fn api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn api_secret(mut self, api_secret: String) -> Self {
        self.api_secret = Some(api_secret);
        self
    }

    pub fn data_base_url(mut self, data_base_url: String) -> Self {
        self.data_base_url = Some(data_base_url);
        self
    }

    pub fn build(self) -> Result<AlpacaHistoricalProvider, PipelineError> {
        let missing = |field: &'static str| {
            PipelineError::invalid_parameter(field, "required to query Alpaca market data")
        };
        let api_key = self.api_key.filter(|k| !k.is_empty()).ok_or_else(|| missing("api_key"))?;
        let api_secret = self
            .api_secret
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing("api_secret"))?;
        let data_base_url = self
            .data_base_url
            .unwrap_or_else(|| "https://data.alpaca.markets".to_string());

        Ok(AlpacaHistoricalProvider {
            client: HttpClientFactory::create_client(),
            api_key,
            api_secret,
            data_base_url: data_base_url.trim_end_matches('/').to_string(),
        })
    }
}
