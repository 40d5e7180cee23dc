//! nplvision command line
//!
//! Runs one batch: every matching document in the configured input directory
//! is optimized, recognized and persisted, and the batch summary is written
//! to the summary directory.
//!
//! Exit codes: 0 when every document succeeded, 2 when the batch finished
//! with failed documents, 1 when the batch could not run at all.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tracing_subscriber::EnvFilter;

use nplvision::{
    load_config, BatchRunner, BatchSummary, DirectoryScanner, LogProgress, NplError, Pipeline,
    PipelineConfig,
};

/// Loan-collateral document ingestion: OCR repair, remote text detection,
/// per-document text bundles and a batch audit log.
#[derive(Parser)]
#[command(name = "nplvision")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "nplvision.json")]
    config: PathBuf,

    /// Overrides the configured input directory
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Overrides the configured number of documents processed concurrently
    #[arg(short, long)]
    workers: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.json_logs) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(summary) if summary.failed() == 0 => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    // The batch and recognition layers log through the `log` facade.
    tracing_log::LogTracer::init()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<BatchSummary, NplError> {
    let mut config = load_config(&cli.config)?;
    info!("Loaded configuration from {}", cli.config.display());

    if let Some(input) = cli.input {
        config.input_directory = input.display().to_string();
    }
    if let Some(workers) = cli.workers {
        config.worker_count = workers.max(1);
    }

    let pipeline_config = Arc::new(PipelineConfig::from_config(&config));
    let scanner = DirectoryScanner::with_pattern(
        &pipeline_config.input_directory,
        &pipeline_config.input_pattern,
    )?;

    let pipeline = Arc::new(Pipeline::from_config(pipeline_config)?);
    let runner = BatchRunner::from_pipeline(pipeline);

    let (summary, path) = runner
        .run_directory(&scanner, Arc::new(LogProgress))
        .await?;

    println!("Processed {} documents", summary.total_files);
    println!("  successful:           {}", summary.successful);
    println!("  repair failures:      {}", summary.repair_failures);
    println!("  recognition failures: {}", summary.textract_failures);
    println!("  unexpected errors:    {}", summary.unexpected_errors);
    println!("Summary: {}", path.display());

    Ok(summary)
}
