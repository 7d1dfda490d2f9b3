//! Sync pipeline: one lister feeding a fixed pool of transfer workers
//!
//! - The lister pushes descriptors onto a bounded queue, page by page
//! - Workers pull from the queue and run the destination's transfer strategy
//! - The queue is closed once listing ends, whether it succeeded or not
//! - The run resolves only after every worker has drained the queue

mod coordinator;
mod counters;
mod lister;
mod transfer;
mod types;
mod worker;

use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::store::ObjectStore;

pub use coordinator::{PoolOutcome, WorkerPool};
pub use counters::{CounterSnapshot, RunCounters};
pub use lister::{ListingOutcome, ObjectLister};
pub use transfer::{
    join_key, local_path, strategy_for, CopyToBucket, DownloadToDirectory, TransferStrategy,
    Transferred,
};
pub use types::{PipelineState, RunReport, WorkerFailure, WorkerReport};

/// A finished run: the report plus the error that failed it, if any
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    /// Listing or local I/O failure. Transfer failures live in the report.
    pub error: Option<SyncError>,
}

impl RunOutcome {
    pub fn into_result(self) -> SyncResult<RunReport> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }
}

/// Run one sync from `config.source_*` to `config.destination`.
///
/// Returns `Err` only when the run could not start (bad configuration or an
/// unusable destination). Everything after that is reported in [`RunOutcome`].
pub async fn run_sync(config: &SyncConfig, store: Arc<dyn ObjectStore>) -> SyncResult<RunOutcome> {
    config.validate()?;
    let started_at = Utc::now();

    let strategy = strategy_for(&config.destination, store.clone(), &config.source_bucket);
    strategy.prepare().await?;

    let counters = Arc::new(RunCounters::new());
    let (jobs, receiver) = async_channel::bounded(config.queue_capacity);
    let mut pool = WorkerPool::spawn(
        config.worker_count,
        (jobs.clone(), receiver),
        strategy,
        counters.clone(),
        config.failure_policy,
    );

    info!(
        "sync_start: {} -> {} workers={}",
        config.source_url(),
        config.destination,
        config.worker_count
    );

    let listing = ObjectLister::new(store, &config.source_bucket, &config.source_prefix)
        .run(&jobs, &counters)
        .await;
    drop(jobs);
    pool.close_queue();

    let PoolOutcome { workers, fatal } = pool.wait().await;
    let report = RunReport::new(
        config.source_url(),
        config.destination.to_string(),
        counters.snapshot(),
        &workers,
        started_at,
    );

    let error = match (fatal, listing) {
        (Some(fatal), _) => Some(fatal),
        (None, Err(listing_error)) => Some(listing_error),
        (None, Ok(ListingOutcome::QueueClosed)) => {
            warn!(
                "sync_incomplete: every worker stopped, listing ended after {} objects",
                report.discovered
            );
            None
        }
        (None, Ok(ListingOutcome::Exhausted)) => None,
    };

    info!(
        "sync_finish: discovered={} transferred={} failures={} elapsed={:.2}s",
        report.discovered,
        report.transferred,
        report.failures.len(),
        report.elapsed_secs()
    );

    Ok(RunOutcome { report, error })
}
