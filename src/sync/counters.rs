use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the lister and every worker of one run
#[derive(Debug, Default)]
pub struct RunCounters {
    discovered: AtomicU64,
    transferred: AtomicU64,
    bytes_transferred: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub discovered: u64,
    pub transferred: u64,
    pub bytes_transferred: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_discovered(&self, count: u64) {
        self.discovered.fetch_add(count, Ordering::SeqCst);
    }

    pub fn record_transfer(&self, bytes: u64) {
        self.transferred.fetch_add(1, Ordering::SeqCst);
        self.bytes_transferred.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            discovered: self.discovered.load(Ordering::SeqCst),
            transferred: self.transferred.load(Ordering::SeqCst),
            bytes_transferred: self.bytes_transferred.load(Ordering::SeqCst),
        }
    }
}
