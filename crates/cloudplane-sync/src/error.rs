//! Reconciliation error types

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which side of a reconciliation pass a fetch belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSide {
    /// The locally persisted record set
    Local,
    /// The set observed from the cloud provider
    External,
}

impl fmt::Display for FetchSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchSide::Local => write!(f, "local"),
            FetchSide::External => write!(f, "external"),
        }
    }
}

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// A whole-pass fetch failed; nothing was applied.
    #[error("{side} fetch failed: {source}")]
    Fetch {
        side: FetchSide,
        #[source]
        source: Box<SyncError>,
    },

    #[error("Lock acquisition timed out after {timeout:?}: {key}")]
    LockTimeout { key: String, timeout: Duration },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub fn fetch(side: FetchSide, source: SyncError) -> Self {
        SyncError::Fetch {
            side,
            source: Box::new(source),
        }
    }

    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, SyncError::LockTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
