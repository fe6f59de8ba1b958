//! cloudplane task machine
//!
//! A task walks its type's stages from `init` until a handler marks it
//! complete or failed. Stage handlers make exactly one transition per stage;
//! transitions are persisted through a [`TaskStore`] and reported to an
//! [`OpsLog`].
//!
//! ```text
//!   init ──advance──▶ stage ──advance──▶ ... ──┬──▶ Complete
//!     │                 │                      └──▶ Failed
//!     └──schedule──▶ (suspended, resumed by a later run)
//! ```

pub mod delete;
pub mod error;
pub mod handler;
pub mod manager;
pub mod opslog;
pub mod registry;
pub mod stage;
pub mod store;
pub mod task;

// Re-exports
pub use delete::{DeletableModel, DeleteStage, DeleteWithDependentsTask};
pub use error::{Result, TaskError};
pub use handler::TaskHandler;
pub use manager::{TASK_LOCK_SCOPE, TaskManager};
pub use opslog::{MemoryOpsLog, OpsAction, OpsEvent, OpsLog, TracingOpsLog, emit};
pub use registry::{TaskRegistry, TaskRegistryBuilder};
pub use stage::{StageContext, TaskStage, Transition};
pub use store::{MemoryTaskStore, TaskStore};
pub use task::{SubjectRef, Task, TaskStatus};
