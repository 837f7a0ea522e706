//! # News Conveyor
//!
//! Extracts news articles from several sites concurrently, normalizes and
//! validates them, and persists the ordered result as one JSON document.
//!
//! ## Usage
//!
//! ```sh
//! news_conveyor -c sources.yaml -o news_data.json -d diagnostics.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Configuration**: YAML descriptors (or the built-in sources) are
//!    validated; a bad configuration is the only thing that stops a run
//! 2. **Extraction**: every site extractor walks its listing and article
//!    pages concurrently with the others, on one task
//! 3. **Validation**: each raw article becomes a [`models::Record`] or a
//!    diagnostics entry; the first record per URL wins
//! 4. **Output**: records are sorted by `(source, published_at, url)` and
//!    written atomically
//!
//! Exit status: `0` complete, `2` partial (deadline reached), `1` no records
//! or a configuration/output error.

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod conveyor;
mod error;
mod fetch;
mod models;
mod outputs;
mod scrapers;
mod transform;
mod utils;

use cli::Cli;
use config::ConveyorConfig;
use conveyor::{Conveyor, RunReport, RunStatus};
use error::ConfigError;
use fetch::HttpFetcher;
use outputs::json::{self, JsonSink};
use utils::ensure_writable_parent;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_conveyor starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let report = run(&config).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        status = report.status.as_str(),
        records = report.records.len(),
        "Execution complete"
    );

    Ok(match report.status {
        RunStatus::Complete => ExitCode::SUCCESS,
        RunStatus::Partial(_) => ExitCode::from(2),
        RunStatus::Failed => ExitCode::FAILURE,
    })
}

/// Load the config file (or the built-in sources), apply CLI overrides, validate.
fn resolve_config(args: &Cli) -> Result<ConveyorConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => ConveyorConfig::load(path)?,
        None => ConveyorConfig::default(),
    };

    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(diagnostics) = &args.diagnostics {
        config.diagnostics_path = Some(diagnostics.clone());
    }
    if let Some(secs) = args.run_timeout {
        config.run_timeout_seconds = secs;
    }
    if let Some(max) = args.max_connections_per_host {
        config.max_connections_per_host = max;
    }

    config.validate()?;
    Ok(config)
}

#[instrument(level = "info", skip_all, fields(output = %config.output_path.display()))]
async fn run(config: &ConveyorConfig) -> Result<RunReport, Box<dyn Error>> {
    // Fail before any fetch if the artifacts cannot be written
    for path in std::iter::once(&config.output_path).chain(config.diagnostics_path.as_ref()) {
        ensure_writable_parent(path)
            .await
            .map_err(|source| ConfigError::Unwritable {
                path: path.display().to_string(),
                source,
            })?;
    }

    let extractors = config
        .extractors
        .iter()
        .map(scrapers::build)
        .collect::<Result<Vec<_>, _>>()?;
    let fetcher = HttpFetcher::new(config.fetch_settings())
        .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {e}")))?;

    let conveyor = Conveyor::new(extractors, Arc::new(fetcher), config.run_timeout())?
        .with_duplicate_policy(config.duplicate_policy);
    let report = conveyor.execute().await;

    log_summary(&report);

    let sink = JsonSink::new(&config.output_path);
    sink.write_records(&report.records).await?;
    debug!(path = %sink.path().display(), "Output committed");

    if let Some(path) = &config.diagnostics_path {
        json::write_json(path, &report).await?;
        info!(path = %path.display(), "Wrote diagnostics");
    }

    Ok(report)
}

fn log_summary(report: &RunReport) {
    for (source, stats) in &report.diagnostics {
        info!(
            %source,
            accepted = stats.accepted_count,
            rejected = stats.rejected_count,
            failed = stats.failed_count,
            "Source summary"
        );
    }
    match report.status {
        RunStatus::Complete => info!(records = report.records.len(), "Run complete"),
        RunStatus::Partial(timeout) => warn!(
            error = %timeout,
            records = report.records.len(),
            unfinished = ?report.unfinished_sources,
            "Run partially completed"
        ),
        RunStatus::Failed => error!(
            failed_sources = ?report.failed_sources,
            "Run failed: no source produced a valid record"
        ),
    }
}
