//! Task type registration table
//!
//! Built once at start-up and shared read-only with the [`TaskManager`](crate::TaskManager).

use crate::error::{Result, TaskError};
use crate::handler::{Erased, ErasedHandler, TaskHandler};
use std::collections::HashMap;
use std::sync::Arc;

pub struct TaskRegistry {
    handlers: HashMap<&'static str, Arc<dyn ErasedHandler>>,
}

impl TaskRegistry {
    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::default()
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Registered type names, sorted
    pub fn task_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn get(&self, task_type: &str) -> Result<Arc<dyn ErasedHandler>> {
        self.handlers
            .get(task_type)
            .cloned()
            .ok_or_else(|| TaskError::UnknownTaskType(task_type.to_string()))
    }
}

#[derive(Default)]
pub struct TaskRegistryBuilder {
    handlers: HashMap<&'static str, Arc<dyn ErasedHandler>>,
}

impl TaskRegistryBuilder {
    /// Add a handler; a type name may only be registered once
    pub fn register<H: TaskHandler>(mut self, handler: H) -> Result<Self> {
        let handler = Erased(handler);
        let name = handler.task_type();
        if self.handlers.contains_key(name) {
            return Err(TaskError::DuplicateTaskType(name.to_string()));
        }
        tracing::debug!("Registered task type {}", name);
        self.handlers.insert(name, Arc::new(handler));
        Ok(self)
    }

    pub fn build(self) -> Arc<TaskRegistry> {
        Arc::new(TaskRegistry {
            handlers: self.handlers,
        })
    }
}
