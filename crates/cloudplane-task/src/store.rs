//! Task persistence

use crate::error::{Result, TaskError};
use crate::task::Task;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// Where task records live
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: &Task) -> Result<()>;

    /// Fails with [`TaskError::TaskNotFound`] for an unknown id
    async fn get(&self, id: &str) -> Result<Task>;

    async fn update(&self, task: &Task) -> Result<()>;

    /// All tasks, oldest first
    async fn list(&self) -> Result<Vec<Task>>;

    /// Tasks that are neither complete nor failed
    async fn list_unfinished(&self) -> Result<Vec<Task>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|t| !t.is_terminal())
            .collect())
    }
}

/// In-process task table
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> Result<MutexGuard<'_, Vec<Task>>> {
        self.tasks
            .lock()
            .map_err(|e| TaskError::Store(format!("task table poisoned: {}", e)))
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: &Task) -> Result<()> {
        let mut tasks = self.tasks()?;
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(TaskError::Store(format!("duplicate task id {}", task.id)));
        }
        tasks.push(task.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Task> {
        self.tasks()?
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| TaskError::TaskNotFound(id.to_string()))
    }

    async fn update(&self, task: &Task) -> Result<()> {
        let mut tasks = self.tasks()?;
        let slot = tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| TaskError::TaskNotFound(task.id.clone()))?;
        *slot = task.clone();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Task>> {
        Ok(self.tasks()?.clone())
    }
}
