//! Quake Ingest - earthquake feed collector

use clap::Parser;
use quake_common::logging::{init_logging, LogConfig, LogLevel};
use quake_ingest::{IngestConfig, IngestError, Pipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "quake-ingest")]
#[command(author, version, about = "Collect and publish recent earthquake events")]
struct Cli {
    /// Fetch, reconcile and write locally without publishing
    #[arg(long)]
    dry_run: bool,

    /// Local dataset path (overrides QUAKE_OUTPUT_PATH)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Retention cap (overrides QUAKE_MAX_RECORDS)
    #[arg(long)]
    max_records: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let defaults = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("quake-ingest")
        .build();

    // Environment variables take precedence over flags
    let log_config = defaults.clone().merge_env().unwrap_or(defaults);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        },
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Collector run failed");
            ExitCode::from(e.exit_code())
        },
    }
}

async fn run(cli: Cli) -> Result<(), IngestError> {
    let mut config = IngestConfig::from_env()?;

    if let Some(output) = cli.output {
        config.output_path = output;
    }
    if let Some(max_records) = cli.max_records {
        config.max_records = max_records;
    }

    let report = Pipeline::from_config(config, cli.dry_run)?.run().await?;

    info!(
        records = report.records_written(),
        failed_sources = report.source_failures.len(),
        "Ingestion complete"
    );
    Ok(())
}
