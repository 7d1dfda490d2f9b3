//! Command line interface

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{
    FailurePolicy, S3Settings, SyncConfig, TransferDestination, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_REGION, DEFAULT_WORKER_COUNT, MAX_PAGE_SIZE,
};
use crate::providers::S3Store;
use crate::sync::{run_sync, RunReport};

/// Exit code when some objects failed to transfer but the run itself completed
const EXIT_PARTIAL_FAILURE: u8 = 2;
const EXIT_FAILURE: u8 = 1;

/// Sync an S3 prefix to a local directory or to another bucket.
///
/// ## Examples
///
/// Download a prefix:
///   s3sync s3://my-bucket/logs/2024/ ./logs
///
/// Copy a prefix into another bucket, server side:
///   s3sync s3://my-bucket/logs/ s3://archive-bucket/backup/
#[derive(Parser, Debug)]
#[command(name = "s3sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Source location, s3://bucket/prefix
    pub source: String,

    /// Destination: s3://bucket/prefix for a bucket copy, otherwise a local directory
    pub destination: String,

    // === Pipeline Options ===
    /// Number of concurrent transfer workers (must be >= 1)
    #[arg(short, long, env = "S3SYNC_WORKERS", default_value_t = DEFAULT_WORKER_COUNT, value_parser = parse_positive_usize)]
    pub workers: usize,

    /// Number of listed objects that may wait for a free worker (must be >= 1)
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_parser = parse_positive_usize)]
    pub queue_capacity: usize,

    /// Keys requested per listing page (1-1000)
    #[arg(long, default_value_t = MAX_PAGE_SIZE, value_parser = clap::value_parser!(i32).range(1..=1000))]
    pub page_size: i32,

    /// Keep a worker running after one of its transfers fails
    #[arg(long)]
    pub skip_failed: bool,

    // === S3 Configuration ===
    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Custom S3 endpoint URL (S3-compatible services, LocalStack)
    #[arg(long, env = "S3SYNC_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    pub force_path_style: bool,

    /// AWS profile name
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// AWS access key ID
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key: Option<String>,

    /// AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    // === Output Options ===
    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Parse a positive usize (>= 1).
fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if value < 1 {
        return Err(format!("{} is not in 1..", value));
    }
    Ok(value)
}

/// Initialize logging to stderr so stdout stays clean for the JSON report.
pub fn init_logging(level: LogLevel) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}

impl Cli {
    pub fn sync_config(&self) -> Result<SyncConfig> {
        let policy = if self.skip_failed {
            FailurePolicy::SkipObject
        } else {
            FailurePolicy::StopWorker
        };
        let config = SyncConfig::new(&self.source, &self.destination)?
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
            .with_failure_policy(policy);
        config.validate()?;
        Ok(config)
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            profile: self.profile.clone(),
            access_key_id: self.access_key.clone(),
            secret_access_key: self.secret_key.clone(),
            page_size: self.page_size,
        }
    }
}

/// Execute a sync with the parsed arguments and map the result to an exit code.
pub async fn execute(cli: Cli) -> Result<ExitCode> {
    let config = cli.sync_config()?;
    let store = S3Store::connect(&cli.s3_settings()).await;

    let outcome = run_sync(&config, Arc::new(store))
        .await
        .with_context(|| format!("cannot sync {} to {}", config.source_url(), config.destination))?;

    print_summary(&config, &outcome.report, cli.json)?;

    if let Some(err) = outcome.error {
        eprintln!("Error: {}", err);
        return Ok(ExitCode::from(EXIT_FAILURE));
    }
    if !outcome.report.is_success() {
        return Ok(ExitCode::from(EXIT_PARTIAL_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(config: &SyncConfig, report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let action = match config.destination {
        TransferDestination::LocalDirectory(_) => "download",
        TransferDestination::RemoteLocation { .. } => "copy",
    };
    eprintln!("Found {} objects to {}.", report.discovered, action);
    eprintln!(
        "Transferred {} objects ({} bytes) in {:.2}s.",
        report.transferred,
        report.bytes_transferred,
        report.elapsed_secs()
    );
    if !report.failures.is_empty() {
        eprintln!(
            "{} transfers failed, {} workers stopped early:",
            report.failures.len(),
            report.workers_stopped_early
        );
        for failure in &report.failures {
            eprintln!(
                "  worker {}: {} {}",
                failure.worker_id,
                failure.key.as_deref().unwrap_or("-"),
                failure.error
            );
        }
    }
    Ok(())
}
