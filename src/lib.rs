use clap::Parser;
use std::process::ExitCode;

pub mod cli;
pub mod config;
pub mod error;
pub mod providers;
pub mod store;
pub mod sync;

pub use config::{FailurePolicy, S3Settings, SyncConfig, TransferDestination};
pub use error::{SyncError, SyncResult};
pub use store::{MemoryStore, ObjectDescriptor, ObjectStore};
pub use sync::{run_sync, RunOutcome, RunReport};

/// Entry point for the `s3sync` binary
pub fn run() -> ExitCode {
    let cli = cli::Cli::parse();

    if let Err(e) = cli::init_logging(cli.log_level) {
        eprintln!("{}", e);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::execute(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
