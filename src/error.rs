//! Error types for a sync run

use std::path::PathBuf;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The store rejected or interrupted a listing request
    #[error("listing s3://{bucket}/{prefix} failed: {message}")]
    Listing {
        bucket: String,
        prefix: String,
        message: String,
    },

    /// A single object failed to download or copy
    #[error("transfer of {key} failed: {message}")]
    Transfer { key: String, message: String },

    /// The local destination could not be created or written
    #[error("local I/O failure at {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub(crate) fn transfer(key: &str, message: impl std::fmt::Display) -> Self {
        SyncError::Transfer {
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Errors that abort the whole run instead of a single worker.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::Transfer { .. })
    }
}
