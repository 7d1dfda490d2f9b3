//! Run configuration: source, destination, pool sizing and S3 client settings

use std::fmt;
use std::path::PathBuf;

use crate::error::{SyncError, SyncResult};

pub const DEFAULT_WORKER_COUNT: usize = 10;
/// A single slot keeps listing at most one object ahead of the pool.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;
pub const DEFAULT_REGION: &str = "us-east-1";
/// S3 caps ListObjectsV2 pages at 1000 keys.
pub const MAX_PAGE_SIZE: i32 = 1000;

const S3_SCHEME: &str = "s3://";

/// Where transferred objects end up. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferDestination {
    LocalDirectory(PathBuf),
    RemoteLocation { bucket: String, prefix: String },
}

impl TransferDestination {
    /// `s3://bucket/prefix` selects a remote copy, anything else is a local path.
    pub fn parse(value: &str) -> SyncResult<Self> {
        if value.starts_with(S3_SCHEME) {
            let (bucket, prefix) = parse_s3_url(value)?;
            Ok(TransferDestination::RemoteLocation { bucket, prefix })
        } else if value.trim().is_empty() {
            Err(SyncError::Config("destination must not be empty".to_string()))
        } else {
            Ok(TransferDestination::LocalDirectory(PathBuf::from(value)))
        }
    }
}

impl fmt::Display for TransferDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDestination::LocalDirectory(root) => write!(f, "{}", root.display()),
            TransferDestination::RemoteLocation { bucket, prefix } => {
                write!(f, "{}{}/{}", S3_SCHEME, bucket, prefix)
            }
        }
    }
}

/// What a worker does after one of its transfers fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The worker stops consuming; the rest of the pool keeps going.
    #[default]
    StopWorker,
    /// The failed object is recorded and the worker moves on.
    SkipObject,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source_bucket: String,
    pub source_prefix: String,
    pub destination: TransferDestination,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub failure_policy: FailurePolicy,
}

impl SyncConfig {
    pub fn new(source_url: &str, destination: &str) -> SyncResult<Self> {
        let (source_bucket, source_prefix) = parse_s3_url(source_url)?;
        Ok(Self {
            source_bucket,
            source_prefix,
            destination: TransferDestination::parse(destination)?,
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            failure_policy: FailurePolicy::default(),
        })
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn source_url(&self) -> String {
        format!("{}{}/{}", S3_SCHEME, self.source_bucket, self.source_prefix)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.source_bucket.is_empty() {
            return Err(SyncError::Config("source bucket must not be empty".to_string()));
        }
        if self.worker_count == 0 {
            return Err(SyncError::Config("worker count must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(SyncError::Config("queue capacity must be at least 1".to_string()));
        }
        if let TransferDestination::RemoteLocation { bucket, .. } = &self.destination {
            if bucket.is_empty() {
                return Err(SyncError::Config(
                    "destination bucket must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Settings for building the S3 client
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub region: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub profile: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub page_size: i32,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            force_path_style: false,
            profile: None,
            access_key_id: None,
            secret_access_key: None,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Split `s3://bucket/some/prefix` into `("bucket", "some/prefix")`.
pub fn parse_s3_url(url: &str) -> SyncResult<(String, String)> {
    let rest = url
        .strip_prefix(S3_SCHEME)
        .ok_or_else(|| SyncError::Config(format!("{} is not an s3:// URL", url)))?;
    let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(SyncError::Config(format!("{} has no bucket name", url)));
    }
    Ok((bucket.to_string(), prefix.to_string()))
}
