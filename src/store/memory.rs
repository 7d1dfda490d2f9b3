use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ListPage, ObjectBody, ObjectDescriptor, ObjectStore, StoreResult};

/// Chunk size used when streaming bodies back to readers
const BODY_CHUNK_SIZE: usize = 4;

/// In-process object store with fault injection.
///
/// Buckets are created on first write. Listing returns keys in lexical order,
/// `page_size` keys per page.
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Bytes>>>,
    page_size: usize,
    fail_listing_after: Option<usize>,
    failing_keys: HashSet<String>,
    broken_bodies: HashSet<String>,
    list_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            page_size: 1000,
            fail_listing_after: None,
            failing_keys: HashSet::new(),
            broken_bodies: HashSet::new(),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Serve `pages` listing pages successfully, then fail every later request.
    pub fn with_listing_failure_after(mut self, pages: usize) -> Self {
        self.fail_listing_after = Some(pages);
        self
    }

    /// Downloads and copies of `key` fail before any byte is produced.
    pub fn with_failing_key(mut self, key: impl Into<String>) -> Self {
        self.failing_keys.insert(key.into());
        self
    }

    /// Downloads of `key` yield the first chunk and then fail.
    pub fn with_broken_body(mut self, key: impl Into<String>) -> Self {
        self.broken_bodies.insert(key.into());
        self
    }

    pub fn create_bucket(&self, bucket: &str) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.entry(bucket.to_string()).or_default();
    }

    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.get(bucket)?.get(key).cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of listing requests served so far, failed ones included.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> StoreResult<ListPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_listing_after {
            if call >= limit {
                return Err(format!("InternalError: listing page {} refused", call + 1).into());
            }
        }

        let start: usize = match continuation_token {
            Some(token) => token
                .parse()
                .map_err(|_| format!("InvalidArgument: bad continuation token {}", token))?,
            None => 0,
        };

        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let matching: Vec<ObjectDescriptor> = buckets
            .get(bucket)
            .ok_or_else(|| format!("NoSuchBucket: {}", bucket))?
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectDescriptor::new(key.clone()).with_size(data.len() as u64))
            .collect();

        let end = (start + self.page_size).min(matching.len());
        let objects = matching
            .get(start..end)
            .map(|page| page.to_vec())
            .unwrap_or_default();

        Ok(ListPage {
            objects,
            continuation_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn download(&self, bucket: &str, key: &str) -> StoreResult<ObjectBody> {
        if self.failing_keys.contains(key) {
            return Err(format!("InternalError: download of {} refused", key).into());
        }
        let data = self
            .get(bucket, key)
            .ok_or_else(|| format!("NoSuchKey: {}/{}", bucket, key))?;

        let mut chunks: Vec<StoreResult<Bytes>> = data
            .chunks(BODY_CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        if self.broken_bodies.contains(key) {
            chunks.truncate(1);
            chunks.push(Err("connection reset while reading body".into()));
        }

        Ok(stream::iter(chunks).boxed())
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StoreResult<()> {
        if self.failing_keys.contains(source_key) {
            return Err(format!("InternalError: copy of {} refused", source_key).into());
        }
        let data = self
            .get(source_bucket, source_key)
            .ok_or_else(|| format!("NoSuchKey: {}/{}", source_bucket, source_key))?;
        self.put(dest_bucket, dest_key, data);
        Ok(())
    }
}
