//! Object store capability consumed by the sync pipeline
//!
//! The pipeline only needs three operations from a store: paginated listing,
//! streaming downloads and server-side copies. `S3Store` talks to S3 through
//! the AWS SDK, `MemoryStore` keeps everything in process.

mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Object body as a stream of byte chunks
pub type ObjectBody = BoxStream<'static, StoreResult<Bytes>>;

/// One remote object discovered by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub key: String,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            last_modified: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Keys ending in `/` are folder placeholders, not data objects.
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// One batch of descriptors returned by a single listing call
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectDescriptor>,
    /// Token for the next page, `None` when the listing is exhausted
    pub continuation_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of objects whose key starts with `prefix`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> StoreResult<ListPage>;

    /// Open the object body for streaming.
    async fn download(&self, bucket: &str, key: &str) -> StoreResult<ObjectBody>;

    /// Server-side copy; the object bytes never leave the store.
    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StoreResult<()>;
}
