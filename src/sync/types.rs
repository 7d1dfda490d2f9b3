//! Run state and report types

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::counters::CounterSnapshot;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum PipelineState {
    /// Queue open, lister and workers active
    #[serde(rename = "running")]
    Running,
    /// Queue closed, workers consuming what is left
    #[serde(rename = "draining")]
    Draining,
    /// Every worker has exited
    #[serde(rename = "done")]
    Done,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Running => write!(f, "running"),
            PipelineState::Draining => write!(f, "draining"),
            PipelineState::Done => write!(f, "done"),
        }
    }
}

/// A transfer that failed, as reported by the worker that attempted it
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkerFailure {
    pub worker_id: usize,
    /// `None` when the worker died outside of a transfer
    pub key: Option<String>,
    pub error: String,
}

/// How one worker's loop ended
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub transferred: u64,
    pub failures: Vec<WorkerFailure>,
    /// True when the worker left before the queue was exhausted
    pub stopped_early: bool,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source: String,
    pub destination: String,
    pub discovered: u64,
    pub transferred: u64,
    pub bytes_transferred: u64,
    pub workers_stopped_early: usize,
    pub failures: Vec<WorkerFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub(crate) fn new(
        source: String,
        destination: String,
        counters: CounterSnapshot,
        workers: &[WorkerReport],
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            destination,
            discovered: counters.discovered,
            transferred: counters.transferred,
            bytes_transferred: counters.bytes_transferred,
            workers_stopped_early: workers.iter().filter(|w| w.stopped_early).count(),
            failures: workers
                .iter()
                .flat_map(|w| w.failures.iter().cloned())
                .collect(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
