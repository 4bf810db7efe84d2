use crate::domain::errors::PipelineError;
use crate::domain::ml::frame::{Column, MarketFrame};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct AlpacaBar {
    #[serde(rename = "t")]
    pub timestamp: String,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
}

/// One page of `GET /v2/stocks/bars`.
#[derive(Debug, Deserialize)]
pub struct AlpacaBarsPage {
    #[serde(default)]
    pub bars: HashMap<String, Vec<AlpacaBar>>,
    pub next_page_token: Option<String>,
}

/// Converts bars into a frame with the OHLCV columns, in the order received.
pub fn bars_to_frame(bars: &[AlpacaBar]) -> Result<MarketFrame, PipelineError> {
    let timestamps = bars
        .iter()
        .map(|bar| {
            DateTime::parse_from_rfc3339(&bar.timestamp)
                .map(|t| t.timestamp_millis())
                .map_err(|e| PipelineError::MarketData {
                    reason: format!("invalid bar timestamp `{}`: {}", bar.timestamp, e),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let column = |name: &str, value: fn(&AlpacaBar) -> f64| {
        Column::new(name, bars.iter().map(|b| Some(value(b))).collect())
    };

    MarketFrame::new(
        timestamps,
        vec![
            column("Open", |b| b.open),
            column("High", |b| b.high),
            column("Low", |b| b.low),
            column("Close", |b| b.close),
            column("Volume", |b| b.volume),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_deserialization_and_conversion() {
        let json = r#"{
            "bars": {"AAPL": [
                {"t": "2024-01-02T05:00:00Z", "o": 187.15, "h": 188.44, "l": 183.89, "c": 185.64, "v": 82488674, "n": 1009074, "vw": 185.9}
            ]},
            "next_page_token": null
        }"#;
        let page: AlpacaBarsPage = serde_json::from_str(json).unwrap();
        assert!(page.next_page_token.is_none());

        let frame = bars_to_frame(&page.bars["AAPL"]).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.timestamps()[0], 1_704_171_600_000);
        assert_eq!(frame.column("Close").unwrap().values, vec![Some(185.64)]);
        assert_eq!(frame.column("Volume").unwrap().values, vec![Some(82_488_674.0)]);
    }

    #[test]
    fn test_empty_page_has_no_bars() {
        let page: AlpacaBarsPage = serde_json::from_str(r#"{"bars": {}, "next_page_token": null}"#).unwrap();
        assert!(page.bars.is_empty());
    }

    #[test]
    fn test_bad_timestamp_is_market_data_error() {
        let bar = AlpacaBar {
            timestamp: "yesterday".to_string(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        };
        assert!(matches!(
            bars_to_frame(&[bar]),
            Err(PipelineError::MarketData { .. })
        ));
    }
}
