use crate::domain::errors::PipelineError;
use crate::domain::ml::frame::{Column, MarketFrame};
use crate::domain::ml::request::HistoryRange;
use crate::domain::ports::MarketDataProvider;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Deterministic random-walk daily bars for demos and tests.
///
/// Each ticker gets a fixed series of `rows` weekday bars ending at
/// `last_day`; requests are answered from that series, so the same
/// seed and ticker always yield the same prices.
#[derive(Debug, Clone)]
pub struct SyntheticMarketDataProvider {
    rows: usize,
    seed: u64,
    last_day: NaiveDate,
}

impl SyntheticMarketDataProvider {
    pub fn new(rows: usize, seed: u64) -> Self {
        Self {
            rows,
            seed,
            last_day: Utc::now().date_naive(),
        }
    }

    pub fn with_last_day(mut self, last_day: NaiveDate) -> Self {
        self.last_day = last_day;
        self
    }

    fn trading_days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(self.rows);
        let mut day = self.last_day;
        while days.len() < self.rows {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(day);
            }
            day -= Duration::days(1);
        }
        days.reverse();
        days
    }

    fn ticker_seed(&self, ticker: &str) -> u64 {
        // FNV-1a over the ticker, mixed with the configured seed
        ticker
            .to_uppercase()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325 ^ self.seed, |h, b| {
                (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            })
    }

    pub fn generate(&self, ticker: &str) -> Result<MarketFrame, PipelineError> {
        let mut rng = StdRng::seed_from_u64(self.ticker_seed(ticker));
        let days = self.trading_days();

        let mut open = Vec::with_capacity(days.len());
        let mut high = Vec::with_capacity(days.len());
        let mut low = Vec::with_capacity(days.len());
        let mut close = Vec::with_capacity(days.len());
        let mut volume = Vec::with_capacity(days.len());

        let mut last_close: f64 = rng.random_range(50.0..250.0);
        for _ in &days {
            let o = last_close * (1.0 + rng.random_range(-0.005..0.005));
            let c = o * (1.0 + rng.random_range(-0.02..0.0205));
            let h = o.max(c) * (1.0 + rng.random_range(0.0..0.01));
            let l = o.min(c) * (1.0 - rng.random_range(0.0..0.01));
            let v = rng.random_range(1_000_000.0_f64..5_000_000.0).round();

            open.push(Some(o));
            high.push(Some(h));
            low.push(Some(l));
            close.push(Some(c));
            volume.push(Some(v));
            last_close = c;
        }

        let timestamps = days
            .iter()
            .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
            .collect();

        MarketFrame::new(
            timestamps,
            vec![
                Column::new("Open", open),
                Column::new("High", high),
                Column::new("Low", low),
                Column::new("Close", close),
                Column::new("Volume", volume),
            ],
        )
    }
}

#[async_trait]
impl MarketDataProvider for SyntheticMarketDataProvider {
    async fn fetch_history(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> Result<MarketFrame, PipelineError> {
        range.validate()?;
        let series = self.generate(ticker)?;

        let frame = match range {
            HistoryRange::Between { start, end } => series.between(
                start.and_time(NaiveTime::MIN).and_utc().timestamp_millis(),
                end.and_time(NaiveTime::MIN).and_utc().timestamp_millis(),
            ),
            HistoryRange::LastRows(n) => series.latest_rows(n),
        };

        info!(
            "SyntheticMarketDataProvider: Generated {} rows for {}",
            frame.len(),
            ticker
        );
        Ok(frame)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(rows: usize) -> SyntheticMarketDataProvider {
        SyntheticMarketDataProvider::new(rows, 7)
            .with_last_day(NaiveDate::from_ymd_opt(2024, 6, 28).unwrap())
    }

    #[tokio::test]
    async fn test_same_ticker_same_prices() {
        let a = provider(30).fetch_history("AAPL", HistoryRange::LastRows(30)).await.unwrap();
        let b = provider(30).fetch_history("aapl", HistoryRange::LastRows(30)).await.unwrap();
        let c = provider(30).fetch_history("MSFT", HistoryRange::LastRows(30)).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_last_rows_are_the_newest_weekdays() {
        let frame = provider(50)
            .fetch_history("AAPL", HistoryRange::LastRows(5))
            .await
            .unwrap();

        assert_eq!(frame.len(), 5);
        let last = NaiveDate::from_ymd_opt(2024, 6, 28)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp_millis();
        assert_eq!(*frame.timestamps().last().unwrap(), last);
        // Friday back to Monday, no weekend gaps inside the week.
        assert_eq!(frame.timestamps()[0], last - 4 * 86_400_000);
    }

    #[tokio::test]
    async fn test_between_filters_series() {
        let range = HistoryRange::Between {
            start: NaiveDate::from_ymd_opt(2024, 6, 24).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 27).unwrap(),
        };
        let frame = provider(50).fetch_history("AAPL", range).await.unwrap();
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn test_bars_are_internally_consistent() {
        let frame = provider(100).generate("AAPL").unwrap();
        let col = |name: &str| frame.column(name).unwrap().values.clone();
        let (open, high, low, close) = (col("Open"), col("High"), col("Low"), col("Close"));

        for i in 0..frame.len() {
            let (o, h, l, c) = (open[i].unwrap(), high[i].unwrap(), low[i].unwrap(), close[i].unwrap());
            assert!(h >= o.max(c));
            assert!(l <= o.min(c));
            assert!(l > 0.0);
        }
    }
}
