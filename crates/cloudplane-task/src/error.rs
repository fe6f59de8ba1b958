//! Task error types

use cloudplane_sync::SyncError;
use thiserror::Error;

/// Task machine errors.
///
/// A business-level stage failure is not an error: it is the `Failed`
/// terminal state with its diagnostic payload.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A stage handler broke the one-transition-per-stage contract
    #[error("Stage contract violation: {0}")]
    ContractViolation(String),

    #[error("Task {0} is already terminal")]
    AlreadyTerminal(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Task type registered twice: {0}")]
    DuplicateTaskType(String),

    #[error("Unknown stage {stage} for task type {task_type}")]
    UnknownStage { task_type: String, stage: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Task store error: {0}")]
    Store(String),

    #[error("Lock error: {0}")]
    Lock(#[from] SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for task operations
pub type Result<T> = std::result::Result<T, TaskError>;
