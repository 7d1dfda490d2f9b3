//! Transfer worker loop

use async_channel::Receiver;
use log::{error, info, warn};
use std::sync::Arc;

use crate::config::FailurePolicy;
use crate::error::SyncError;
use crate::store::ObjectDescriptor;

use super::counters::RunCounters;
use super::transfer::TransferStrategy;
use super::types::{WorkerFailure, WorkerReport};

pub(crate) struct Worker {
    pub id: usize,
    pub jobs: Receiver<ObjectDescriptor>,
    pub strategy: Arc<dyn TransferStrategy>,
    pub counters: Arc<RunCounters>,
    pub policy: FailurePolicy,
}

/// Run one worker until the queue is closed and empty, or until it gives up.
///
/// A fatal error (local I/O) closes the queue for everyone and is returned
/// alongside the report.
pub(crate) async fn run_worker(worker: Worker) -> (WorkerReport, Option<SyncError>) {
    let Worker {
        id,
        jobs,
        strategy,
        counters,
        policy,
    } = worker;

    let mut report = WorkerReport {
        worker_id: id,
        transferred: 0,
        failures: Vec::new(),
        stopped_early: false,
    };

    while let Ok(descriptor) = jobs.recv().await {
        match strategy.transfer(&descriptor).await {
            Ok(done) => {
                counters.record_transfer(done.bytes);
                report.transferred += 1;
                info!(
                    "worker {} {} {} {} bytes",
                    id,
                    strategy.action(),
                    done.target,
                    done.bytes
                );
            }
            Err(err) => {
                report.failures.push(WorkerFailure {
                    worker_id: id,
                    key: Some(descriptor.key.clone()),
                    error: err.to_string(),
                });

                if err.is_fatal() {
                    error!("worker_abort: {} key={} error={}", id, descriptor.key, err);
                    jobs.close();
                    report.stopped_early = true;
                    return (report, Some(err));
                }

                match policy {
                    FailurePolicy::StopWorker => {
                        warn!("worker_stop: {} key={} error={}", id, descriptor.key, err);
                        report.stopped_early = true;
                        break;
                    }
                    FailurePolicy::SkipObject => {
                        warn!("worker_skip: {} key={} error={}", id, descriptor.key, err);
                    }
                }
            }
        }
    }

    (report, None)
}
