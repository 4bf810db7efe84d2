use crate::domain::errors::PipelineError;
use crate::domain::ml::feature_schema::DATE_COLUMN;
use crate::domain::ml::frame::{Column, MarketFrame};
use crate::domain::ml::request::HistoryRange;
use crate::domain::ports::MarketDataProvider;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads daily bars from `{dir}/{TICKER}.csv`.
///
/// The file needs a `Date` column (RFC 3339 or `YYYY-MM-DD`); every other
/// column whose non-empty cells all parse as numbers is kept. Empty cells
/// are nulls.
pub struct CsvMarketDataProvider {
    dir: PathBuf,
}

impl CsvMarketDataProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker.to_uppercase()))
    }

    fn read_frame(path: &Path) -> Result<MarketFrame, PipelineError> {
        let csv_error = |e: csv::Error| PipelineError::MarketData {
            reason: format!("failed to read {}: {}", path.display(), e),
        };

        let mut rdr = csv::Reader::from_path(path).map_err(csv_error)?;
        let headers = rdr.headers().map_err(csv_error)?.clone();
        let date_idx = headers
            .iter()
            .position(|h| h == DATE_COLUMN)
            .ok_or_else(|| {
                PipelineError::schema(format!(
                    "{} has no `{}` column",
                    path.display(),
                    DATE_COLUMN
                ))
            })?;

        let mut timestamps = Vec::new();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record.map_err(csv_error)?;
            timestamps.push(parse_date(&record[date_idx])?);
            for (j, cell) in record.iter().enumerate() {
                cells[j].push(cell.trim().to_string());
            }
        }

        let mut columns = Vec::new();
        for (j, name) in headers.iter().enumerate() {
            if j == date_idx {
                continue;
            }
            match parse_numeric(&cells[j]) {
                Some(values) => columns.push(Column::new(name, values)),
                None => debug!(
                    "CsvMarketDataProvider: Skipping non-numeric column `{}` in {}",
                    name,
                    path.display()
                ),
            }
        }

        MarketFrame::new(timestamps, columns)
    }
}

/// Milliseconds since epoch at UTC midnight (or the given instant).
fn parse_date(raw: &str) -> Result<i64, PipelineError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(midnight_millis)
        .map_err(|_| PipelineError::invalid_data(format!("unparseable date `{}`", raw)))
}

fn midnight_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// `None` if any non-empty cell is not a number.
fn parse_numeric(cells: &[String]) -> Option<Vec<Option<f64>>> {
    cells
        .iter()
        .map(|cell| {
            if cell.is_empty() {
                Some(None)
            } else {
                cell.parse::<f64>().ok().map(Some)
            }
        })
        .collect()
}

#[async_trait]
impl MarketDataProvider for CsvMarketDataProvider {
    async fn fetch_history(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> Result<MarketFrame, PipelineError> {
        range.validate()?;
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(PipelineError::MarketData {
                reason: format!("no price history for {} at {}", ticker, path.display()),
            });
        }

        let reader_path = path.clone();
        let frame = tokio::task::spawn_blocking(move || Self::read_frame(&reader_path))
            .await
            .map_err(|e| PipelineError::MarketData {
                reason: format!("CSV reader task failed: {}", e),
            })??;

        let frame = match range {
            HistoryRange::Between { start, end } => {
                frame.between(midnight_millis(start), midnight_millis(end))
            }
            HistoryRange::LastRows(n) => frame.latest_rows(n),
        };

        info!(
            "CsvMarketDataProvider: Loaded {} rows for {} from {}",
            frame.len(),
            ticker,
            path.display()
        );
        Ok(frame)
    }

    fn name(&self) -> &str {
        "csv"
    }
}
