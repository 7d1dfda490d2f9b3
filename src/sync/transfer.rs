//! Transfer strategies: download into a directory tree, or copy between buckets

use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::TransferDestination;
use crate::error::{SyncError, SyncResult};
use crate::store::{ObjectBody, ObjectDescriptor, ObjectStore};

/// Write buffer size for downloads (2 MB) - reduces I/O operations
const WRITE_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Result of one successful transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transferred {
    /// Local path or `s3://` URL that now holds the object
    pub target: String,
    pub bytes: u64,
}

#[async_trait]
pub trait TransferStrategy: Send + Sync {
    /// Verb used in progress logs.
    fn action(&self) -> &'static str;

    /// One-time setup before any worker starts. Failures here are fatal.
    async fn prepare(&self) -> SyncResult<()> {
        Ok(())
    }

    async fn transfer(&self, descriptor: &ObjectDescriptor) -> SyncResult<Transferred>;
}

/// Pick the strategy for the run's destination.
pub fn strategy_for(
    destination: &TransferDestination,
    store: Arc<dyn ObjectStore>,
    source_bucket: &str,
) -> Arc<dyn TransferStrategy> {
    match destination {
        TransferDestination::LocalDirectory(root) => Arc::new(DownloadToDirectory {
            store,
            source_bucket: source_bucket.to_string(),
            root: root.clone(),
        }),
        TransferDestination::RemoteLocation { bucket, prefix } => Arc::new(CopyToBucket {
            store,
            source_bucket: source_bucket.to_string(),
            dest_bucket: bucket.clone(),
            dest_prefix: prefix.clone(),
        }),
    }
}

/// Map an object key onto a path under `root`.
///
/// A single trailing `/` (directory marker) is allowed. Any other empty
/// segment is refused so that distinct keys never share an output path,
/// and so are `.` and `..` segments.
pub fn local_path(root: &Path, key: &str) -> SyncResult<PathBuf> {
    let trimmed = key.strip_suffix('/').unwrap_or(key);
    let mut path = root.to_path_buf();
    for segment in trimmed.split('/') {
        if segment.is_empty() {
            return Err(SyncError::transfer(key, "key has an empty path segment"));
        }
        if segment == "." || segment == ".." {
            return Err(SyncError::transfer(
                key,
                "key escapes the destination directory",
            ));
        }
        path.push(segment);
    }
    Ok(path)
}

/// Destination key for a copy: `prefix` and `key` joined by exactly one `/`.
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

pub struct DownloadToDirectory {
    store: Arc<dyn ObjectStore>,
    source_bucket: String,
    root: PathBuf,
}

impl DownloadToDirectory {
    async fn write_body(
        &self,
        key: &str,
        path: &Path,
        mut body: ObjectBody,
        file: File,
    ) -> SyncResult<u64> {
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| SyncError::transfer(key, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| SyncError::local_io(path, e))?;
            written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| SyncError::local_io(path, e))?;
        Ok(written)
    }
}

#[async_trait]
impl TransferStrategy for DownloadToDirectory {
    fn action(&self) -> &'static str {
        "downloaded"
    }

    async fn prepare(&self) -> SyncResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder
            .create(&self.root)
            .await
            .map_err(|e| SyncError::local_io(&self.root, e))
    }

    async fn transfer(&self, descriptor: &ObjectDescriptor) -> SyncResult<Transferred> {
        let key = descriptor.key.as_str();
        let path = local_path(&self.root, key)?;

        if descriptor.is_directory_marker() {
            fs::create_dir_all(&path)
                .await
                .map_err(|e| SyncError::local_io(&path, e))?;
            return Ok(Transferred {
                target: path.display().to_string(),
                bytes: 0,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::local_io(parent, e))?;
        }

        let body = self
            .store
            .download(&self.source_bucket, key)
            .await
            .map_err(|e| SyncError::transfer(key, e))?;

        let file = File::create(&path)
            .await
            .map_err(|e| SyncError::local_io(&path, e))?;

        // The file handle is owned by write_body and closed when it returns.
        match self.write_body(key, &path, body, file).await {
            Ok(bytes) => Ok(Transferred {
                target: path.display().to_string(),
                bytes,
            }),
            Err(err) => {
                if !err.is_fatal() {
                    let _ = fs::remove_file(&path).await;
                }
                Err(err)
            }
        }
    }
}

pub struct CopyToBucket {
    store: Arc<dyn ObjectStore>,
    source_bucket: String,
    dest_bucket: String,
    dest_prefix: String,
}

#[async_trait]
impl TransferStrategy for CopyToBucket {
    fn action(&self) -> &'static str {
        "copied"
    }

    async fn transfer(&self, descriptor: &ObjectDescriptor) -> SyncResult<Transferred> {
        let dest_key = join_key(&self.dest_prefix, &descriptor.key);
        self.store
            .copy(
                &self.source_bucket,
                &descriptor.key,
                &self.dest_bucket,
                &dest_key,
            )
            .await
            .map_err(|e| SyncError::transfer(&descriptor.key, e))?;

        Ok(Transferred {
            target: format!("s3://{}/{}", self.dest_bucket, dest_key),
            bytes: descriptor.size.unwrap_or(0),
        })
    }
}
