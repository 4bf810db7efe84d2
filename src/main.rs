//! stockcast - train and serve next-step price regressors
//!
//! # Usage
//! ```sh
//! stockcast train --ticker AAPL --start-date 2023-01-01 --end-date 2024-01-01 --epochs 50
//! stockcast predict --model-id <uuid>
//! stockcast fetch-data --ticker AAPL --days 30
//! ```
//!
//! Configuration is read from the environment (and `.env`); see `config`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use stockcast::application::model_service::ModelService;
use stockcast::config::Config;
use stockcast::domain::errors::PipelineError;
use stockcast::domain::ml::frame::MarketFrame;
use stockcast::domain::ml::request::{HistoryRange, TrainRequest};
use stockcast::infrastructure::ServiceFactory;
use tracing::{Level, error, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Stock price sequence regressor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model on a date range and store it
    Train {
        #[arg(short, long)]
        ticker: String,

        /// Start date (YYYY-MM-DD), inclusive
        #[arg(long)]
        start_date: NaiveDate,

        /// End date (YYYY-MM-DD), exclusive
        #[arg(long)]
        end_date: NaiveDate,

        /// Fraction of rows used for training
        #[arg(long, default_value = "0.8")]
        train_size: f64,

        /// Number of consecutive days per input window
        #[arg(long, default_value = "10")]
        sequence_length: usize,

        /// Column whose next value is predicted
        #[arg(long, default_value = "Close")]
        target_column: String,

        #[arg(short, long, default_value = "100")]
        epochs: usize,
    },
    /// Predict with a stored model on the latest bars of its ticker
    Predict {
        #[arg(short, long)]
        model_id: String,
    },
    /// Print historical bars as CSV
    FetchData {
        #[arg(short, long)]
        ticker: String,

        #[arg(long, requires = "end_date", conflicts_with = "days")]
        start_date: Option<NaiveDate>,

        #[arg(long, requires = "start_date")]
        end_date: Option<NaiveDate>,

        /// Most recent N trading days
        #[arg(short, long)]
        days: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let status = err
                .downcast_ref::<PipelineError>()
                .map(PipelineError::status_code)
                .unwrap_or(500);
            error!("Request failed ({}): {:#}", status, err);
            eprintln!(
                "{}",
                serde_json::json!({ "status": status, "detail": format!("{:#}", err) })
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    info!(
        "stockcast {} (provider={:?}, artifacts={:?})",
        env!("CARGO_PKG_VERSION"),
        config.market_data.source,
        config.storage.artifact_root
    );

    let service = ModelService::new(
        ServiceFactory::create_market_data(&config)?,
        ServiceFactory::create_artifact_store(&config),
        config.training.trainer_config(),
        config.training.scaling,
    );

    match cli.command {
        Commands::Train {
            ticker,
            start_date,
            end_date,
            train_size,
            sequence_length,
            target_column,
            epochs,
        } => {
            let request = TrainRequest {
                ticker,
                start_date,
                end_date,
                train_size,
                sequence_length,
                target_column,
                epochs,
            };
            let outcome = service.train(request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Predict { model_id } => {
            let predictions = service.predict(&model_id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "model_id": model_id,
                    "predictions": predictions,
                }))?
            );
        }
        Commands::FetchData {
            ticker,
            start_date,
            end_date,
            days,
        } => {
            let range = match (start_date, end_date, days) {
                (Some(start), Some(end), None) => HistoryRange::Between { start, end },
                (None, None, Some(n)) => HistoryRange::LastRows(n),
                _ => anyhow::bail!("provide either --start-date and --end-date, or --days"),
            };
            let frame = service.fetch_data(&ticker, range).await?;
            write_csv(&frame, std::io::stdout()).context("Failed to write CSV")?;
        }
    }

    Ok(())
}

fn write_csv<W: std::io::Write>(frame: &MarketFrame, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    let mut header = vec!["Date".to_string()];
    header.extend(frame.columns().iter().map(|c| c.name.clone()));
    wtr.write_record(&header)?;

    for (row, ts) in frame.timestamps().iter().enumerate() {
        let date = DateTime::from_timestamp_millis(*ts)
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| ts.to_string());
        let mut record = vec![date];
        record.extend(
            frame
                .columns()
                .iter()
                .map(|c| c.values[row].map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
