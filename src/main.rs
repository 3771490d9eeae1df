//! Hayate Uploadr - concurrent batch uploader for S3-compatible storage
//!
//! Uploads the given files with the chosen strategy and prints a per-file summary.

use anyhow::Context;
use clap::Parser;
use hayate_uploadr::config::Config;
use hayate_uploadr::hash::Md5Hasher;
use hayate_uploadr::orchestrator::{Orchestrator, RunResult, Strategy};
use hayate_uploadr::s3::S3SignedUrlProvider;
use hayate_uploadr::upload::put_object::HttpTransport;
use hayate_uploadr::upload::UploadFile;
use hayate_uploadr::{metrics, telemetry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Hayate Uploadr - upload files to S3 through a hash → sign → PUT pipeline
#[derive(Parser, Debug)]
#[command(name = "hayate-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults target a local S3 emulator)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Concurrency strategy: sequential, batch or streaming
    #[arg(short, long)]
    strategy: Option<Strategy>,

    /// Log level, overrides logging.level from the config
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    print_metrics: bool,

    /// Print the final progress records as JSON instead of the summary table
    #[arg(long)]
    json: bool,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    telemetry::init_subscriber(&config.logging)?;
    metrics::set_enabled(config.metrics.enabled);
    info!("Starting Hayate Uploadr v{}", hayate_uploadr::VERSION);

    let files = args
        .files
        .iter()
        .map(|path| {
            UploadFile::from_path(path, &config.upload.default_content_type)
                .with_context(|| format!("cannot open {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let signer = S3SignedUrlProvider::new(&config.storage, config.signing.expiry()).await?;
    let mut orchestrator = Orchestrator::new(
        Arc::new(Md5Hasher),
        Arc::new(signer),
        Arc::new(HttpTransport::new()?),
    );

    let strategy = args.strategy.unwrap_or(config.upload.strategy);
    info!(
        strategy = %strategy,
        bucket = %config.storage.bucket,
        files = files.len(),
        "Uploading"
    );

    if let Some(result) = orchestrator.run(strategy, files).await {
        if args.json {
            let tracker = orchestrator.tracker();
            let report = serde_json::json!({
                "runId": result.run_id,
                "strategy": result.strategy,
                "elapsedMs": result.elapsed_ms(),
                "counters": tracker.counters(),
                "files": tracker.snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_summary(&result);
        }
    }

    if args.print_metrics && config.metrics.enabled {
        print!("{}", metrics::gather_text());
    }

    Ok(())
}

fn print_summary(result: &RunResult) {
    println!("{:<4} {:<40} {:<8} DETAIL", "#", "FILE", "STATUS");
    for outcome in &result.outcomes {
        let status = if outcome.is_success() { "ok" } else { "failed" };
        println!(
            "{:<4} {:<40} {:<8} {}",
            outcome.index + 1,
            outcome.file_name,
            status,
            outcome.status_text()
        );
    }
    println!(
        "{} upload: {} succeeded, {} failed in {:.2} ms",
        result.strategy,
        result.completed_count(),
        result.failed_count(),
        result.elapsed_ms()
    );
}
