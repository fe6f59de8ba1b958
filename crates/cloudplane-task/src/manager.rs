//! Task creation and execution

use crate::error::Result;
use crate::handler::Runtime;
use crate::opslog::OpsLog;
use crate::registry::TaskRegistry;
use crate::store::TaskStore;
use crate::task::{SubjectRef, Task};
use cloudplane_sync::{Actor, KeyLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Lock namespace serializing executions of one task
pub const TASK_LOCK_SCOPE: &str = "task";

/// Creates tasks and drives them through their stages.
///
/// `run` holds the key lock `("task", id)` for the whole execution, so one
/// task instance is only ever advanced by one execution at a time. It also
/// holds `(subject.kind, subject.id)` while stages run, which serializes
/// tasks working on the same object.
#[derive(Clone)]
pub struct TaskManager {
    registry: Arc<TaskRegistry>,
    store: Arc<dyn TaskStore>,
    ops_log: Arc<dyn OpsLog>,
    locks: KeyLock,
}

impl TaskManager {
    pub fn new(
        registry: Arc<TaskRegistry>,
        store: Arc<dyn TaskStore>,
        ops_log: Arc<dyn OpsLog>,
        locks: KeyLock,
    ) -> Self {
        Self {
            registry,
            store,
            ops_log,
            locks,
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Persist a new task at its type's entry stage
    pub async fn create_task(
        &self,
        task_type: &str,
        subject: SubjectRef,
        actor: &Actor,
        params: Value,
    ) -> Result<Task> {
        let handler = self.registry.get(task_type)?;
        let task = Task::new(
            task_type,
            handler.init_stage(),
            subject,
            actor.clone(),
            params,
        );
        self.store.insert(&task).await?;
        tracing::debug!("Created task {}", task);
        Ok(task)
    }

    /// Execute `task_id` until it is terminal or suspended, returning the
    /// persisted task. Running a terminal task is a no-op.
    pub async fn run(&self, task_id: &str) -> Result<Task> {
        let _token = self.locks.acquire(TASK_LOCK_SCOPE, task_id).await?;

        let mut task = self.store.get(task_id).await?;
        if task.is_terminal() {
            tracing::debug!("Task {} already {}", task.id, task.status());
            return Ok(task);
        }

        let handler = self.registry.get(&task.task_type)?;
        // after the task lock, always in this order
        let _subject_token = self
            .locks
            .acquire(&task.subject.kind, &task.subject.id)
            .await?;
        let rt = Runtime {
            store: self.store.as_ref(),
            ops_log: &self.ops_log,
        };
        handler.execute(&mut task, &rt).await?;
        Ok(task)
    }

    /// Create and run in one go
    pub async fn start_task(
        &self,
        task_type: &str,
        subject: SubjectRef,
        actor: &Actor,
        params: Value,
    ) -> Result<Task> {
        let task = self.create_task(task_type, subject, actor, params).await?;
        self.run(&task.id).await
    }

    /// Run `task_id` on a background tokio task
    pub fn spawn(&self, task_id: impl Into<String>) -> JoinHandle<Result<Task>> {
        let manager = self.clone();
        let task_id = task_id.into();
        tokio::spawn(async move {
            let result = manager.run(&task_id).await;
            if let Err(e) = &result {
                tracing::error!("Task {} execution failed: {}", task_id, e);
            }
            result
        })
    }

    /// Spawn every task left unfinished by a previous process
    pub async fn resume_unfinished(&self) -> Result<Vec<JoinHandle<Result<Task>>>> {
        let unfinished = self.store.list_unfinished().await?;
        if !unfinished.is_empty() {
            tracing::info!("Resuming {} unfinished task(s)", unfinished.len());
        }
        Ok(unfinished
            .into_iter()
            .map(|task| self.spawn(task.id))
            .collect())
    }
}
