//! Paginated listing that feeds the job queue

use async_channel::Sender;
use log::{debug, info};
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::store::{ObjectDescriptor, ObjectStore};

use super::counters::RunCounters;

/// Why listing stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOutcome {
    /// The store reported no further pages
    Exhausted,
    /// Nobody is consuming any more: every worker exited or the run was aborted
    QueueClosed,
}

/// Walks every object under a prefix, one page at a time.
pub struct ObjectLister {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    continuation_token: Option<String>,
    finished: bool,
    pages: u64,
}

impl ObjectLister {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str, prefix: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            continuation_token: None,
            finished: false,
            pages: 0,
        }
    }

    /// Fetch the next page, `Ok(None)` once the listing is exhausted.
    pub async fn next_page(&mut self) -> SyncResult<Option<Vec<ObjectDescriptor>>> {
        if self.finished {
            return Ok(None);
        }

        let result = self
            .store
            .list_page(
                &self.bucket,
                &self.prefix,
                self.continuation_token.as_deref(),
            )
            .await;
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                self.finished = true;
                return Err(SyncError::Listing {
                    bucket: self.bucket.clone(),
                    prefix: self.prefix.clone(),
                    message: e.to_string(),
                });
            }
        };

        self.pages += 1;
        self.continuation_token = page.continuation_token;
        if self.continuation_token.is_none() {
            self.finished = true;
        }
        Ok(Some(page.objects))
    }

    /// Push every listed object onto `jobs`, page by page.
    ///
    /// Only descriptors the queue accepted are counted as discovered.
    /// Does not close `jobs`; the caller owns that.
    pub async fn run(
        mut self,
        jobs: &Sender<ObjectDescriptor>,
        counters: &RunCounters,
    ) -> SyncResult<ListingOutcome> {
        info!(
            "Looking for objects in bucket: {}, prefix: {}",
            self.bucket, self.prefix
        );

        while let Some(objects) = self.next_page().await? {
            debug!("list_page: {} objects={}", self.pages, objects.len());

            for descriptor in objects {
                if jobs.send(descriptor).await.is_err() {
                    debug!("list_stop: job queue closed after {} pages", self.pages);
                    return Ok(ListingOutcome::QueueClosed);
                }
                counters.add_discovered(1);
            }
        }

        Ok(ListingOutcome::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store_with(keys: &[&str], page_size: usize) -> Arc<MemoryStore> {
        let store = MemoryStore::new().with_page_size(page_size);
        store.create_bucket("src");
        for key in keys {
            store.put("src", key, "x");
        }
        Arc::new(store)
    }

    async fn drain(
        lister: ObjectLister,
        counters: &RunCounters,
    ) -> (SyncResult<ListingOutcome>, Vec<String>) {
        let (tx, rx) = async_channel::unbounded();
        let result = lister.run(&tx, counters).await;
        tx.close();
        let mut keys = Vec::new();
        while let Ok(descriptor) = rx.recv().await {
            keys.push(descriptor.key);
        }
        (result, keys)
    }

    #[tokio::test]
    async fn next_page_follows_continuation_tokens() {
        let store = store_with(&["a", "b", "c"], 2);
        let mut lister = ObjectLister::new(store.clone(), "src", "");

        assert_eq!(lister.next_page().await.unwrap().unwrap().len(), 2);
        assert_eq!(lister.next_page().await.unwrap().unwrap().len(), 1);
        assert!(lister.next_page().await.unwrap().is_none());
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn run_pushes_only_prefixed_keys() {
        let store = store_with(&["logs/1", "logs/2", "other/1"], 1);
        let counters = RunCounters::new();

        let (result, keys) = drain(ObjectLister::new(store, "src", "logs/"), &counters).await;

        assert_eq!(result.unwrap(), ListingOutcome::Exhausted);
        assert_eq!(keys, vec!["logs/1".to_string(), "logs/2".to_string()]);
        assert_eq!(counters.snapshot().discovered, 2);
    }

    #[tokio::test]
    async fn empty_namespace_lists_nothing() {
        let store = store_with(&[], 10);
        let counters = RunCounters::new();

        let (result, keys) = drain(ObjectLister::new(store, "src", ""), &counters).await;

        assert_eq!(result.unwrap(), ListingOutcome::Exhausted);
        assert!(keys.is_empty());
        assert_eq!(counters.snapshot().discovered, 0);
    }

    #[tokio::test]
    async fn failure_keeps_earlier_pages() {
        let store = MemoryStore::new()
            .with_page_size(2)
            .with_listing_failure_after(1);
        for key in ["a", "b", "c", "d"] {
            store.put("src", key, "x");
        }
        let counters = RunCounters::new();

        let (result, keys) =
            drain(ObjectLister::new(Arc::new(store), "src", ""), &counters).await;

        assert!(matches!(result, Err(SyncError::Listing { .. })));
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(counters.snapshot().discovered, 2);
    }

    #[tokio::test]
    async fn closed_queue_stops_listing() {
        let store = store_with(&["a", "b"], 1);
        let counters = RunCounters::new();
        let (tx, rx) = async_channel::bounded(1);
        rx.close();

        let outcome = ObjectLister::new(store, "src", "")
            .run(&tx, &counters)
            .await
            .unwrap();

        assert_eq!(outcome, ListingOutcome::QueueClosed);
    }

    #[tokio::test]
    async fn queue_closed_mid_page_counts_only_accepted_descriptors() {
        let keys: Vec<String> = (0..10).map(|i| format!("k{}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let store = store_with(&refs, 10);
        let counters = RunCounters::new();
        let (tx, rx) = async_channel::bounded(1);

        let consumer = async move {
            let mut received = 0u64;
            for _ in 0..2 {
                if rx.recv().await.is_ok() {
                    received += 1;
                }
            }
            rx.close();
            while rx.recv().await.is_ok() {
                received += 1;
            }
            received
        };
        let (outcome, received) = tokio::join!(
            ObjectLister::new(store, "src", "").run(&tx, &counters),
            consumer
        );

        assert_eq!(outcome.unwrap(), ListingOutcome::QueueClosed);
        assert!(received < 10);
        assert_eq!(counters.snapshot().discovered, received);
    }
}
