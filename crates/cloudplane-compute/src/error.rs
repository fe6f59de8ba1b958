//! Compute wiring error types

use cloudplane_config::ConfigError;
use cloudplane_sync::SyncError;
use cloudplane_task::TaskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Region not found: {0}")]
    RegionNotFound(String),

    #[error("Alert not found: {0}")]
    AlertNotFound(String),

    #[error("Alert record {0} is held and cannot be deleted")]
    RecordHeld(String),

    #[error("Duplicate id: {0}")]
    Duplicate(String),

    #[error("SKU metadata error: {0}")]
    Meta(String),

    #[error("Table lock poisoned: {0}")]
    Poisoned(String),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ComputeError> for SyncError {
    fn from(e: ComputeError) -> Self {
        match e {
            ComputeError::Sync(e) => e,
            ComputeError::RegionNotFound(id) => SyncError::NotFound(format!("region {}", id)),
            other => SyncError::Persistence(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ComputeError>;
