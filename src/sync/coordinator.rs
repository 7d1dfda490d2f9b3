//! Worker pool lifetime and completion tracking

use async_channel::{Receiver, Sender};
use futures_util::future::join_all;
use log::{debug, error};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::FailurePolicy;
use crate::error::SyncError;
use crate::store::ObjectDescriptor;

use super::counters::RunCounters;
use super::transfer::TransferStrategy;
use super::types::{PipelineState, WorkerFailure, WorkerReport};
use super::worker::{run_worker, Worker};

/// Everything the pool hands back once every worker has exited
pub struct PoolOutcome {
    pub workers: Vec<WorkerReport>,
    /// First fatal error raised by a worker, if any
    pub fatal: Option<SyncError>,
}

/// Fixed-size set of workers sharing one job queue
pub struct WorkerPool {
    handles: Vec<JoinHandle<(WorkerReport, Option<SyncError>)>>,
    jobs: Sender<ObjectDescriptor>,
    state: PipelineState,
}

impl WorkerPool {
    /// Spawn `count` workers reading from `jobs`.
    ///
    /// The pool keeps the producer side only to close it; once every worker
    /// has dropped its receiver, sends on the queue fail.
    pub fn spawn(
        count: usize,
        jobs: (Sender<ObjectDescriptor>, Receiver<ObjectDescriptor>),
        strategy: Arc<dyn TransferStrategy>,
        counters: Arc<RunCounters>,
        policy: FailurePolicy,
    ) -> Self {
        let (sender, receiver) = jobs;
        let handles = (1..=count)
            .map(|id| {
                let worker = Worker {
                    id,
                    jobs: receiver.clone(),
                    strategy: strategy.clone(),
                    counters: counters.clone(),
                    policy,
                };
                tokio::spawn(run_worker(worker))
            })
            .collect();

        debug!("pool_state: {} workers={}", PipelineState::Running, count);
        Self {
            handles,
            jobs: sender,
            state: PipelineState::Running,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Signal that no more jobs will arrive. Workers finish what is queued.
    pub fn close_queue(&mut self) {
        if self.state == PipelineState::Running {
            self.jobs.close();
            self.state = PipelineState::Draining;
            debug!("pool_state: {} queued={}", self.state, self.jobs.len());
        }
    }

    /// Close the queue if still open and wait for every worker to exit.
    pub async fn wait(mut self) -> PoolOutcome {
        self.close_queue();

        let results = join_all(self.handles).await;
        let mut workers = Vec::with_capacity(results.len());
        let mut fatal = None;

        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok((report, worker_fatal)) => {
                    if fatal.is_none() {
                        fatal = worker_fatal;
                    }
                    workers.push(report);
                }
                Err(join_error) => {
                    let worker_id = index + 1;
                    error!("worker_panicked: {} error={}", worker_id, join_error);
                    workers.push(WorkerReport {
                        worker_id,
                        transferred: 0,
                        failures: vec![WorkerFailure {
                            worker_id,
                            key: None,
                            error: join_error.to_string(),
                        }],
                        stopped_early: true,
                    });
                }
            }
        }

        self.state = PipelineState::Done;
        debug!("pool_state: {}", self.state);
        PoolOutcome { workers, fatal }
    }
}
