//! Persisted task record

use crate::error::{Result, TaskError};
use chrono::{DateTime, Utc};
use cloudplane_sync::Actor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Executing, or suspended at a scheduled stage
    Running,
    Complete,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Complete => write!(f, "complete"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The object a task operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    /// Model keyword (e.g. "commonalert")
    pub kind: String,
    pub id: String,
    pub name: String,
}

impl SubjectRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({})", self.kind, self.name, self.id)
    }
}

/// One task instance.
///
/// Stage and status only change through [`Task::set_stage`],
/// [`Task::complete`] and [`Task::fail`], which refuse once the task is
/// terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub subject: SubjectRef,
    stage: String,
    pub actor: Actor,
    status: TaskStatus,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        task_type: impl Into<String>,
        init_stage: impl Into<String>,
        subject: SubjectRef,
        actor: Actor,
        params: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: task_type.into(),
            subject,
            stage: init_stage.into(),
            actor,
            status: TaskStatus::Running,
            params,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Payload of the terminal transition
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn set_stage(&mut self, stage: impl Into<String>) -> Result<()> {
        self.ensure_running()?;
        self.stage = stage.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self, payload: Option<Value>) -> Result<()> {
        self.finish(TaskStatus::Complete, payload)
    }

    pub fn fail(&mut self, payload: Value) -> Result<()> {
        self.finish(TaskStatus::Failed, Some(payload))
    }

    fn finish(&mut self, status: TaskStatus, payload: Option<Value>) -> Result<()> {
        self.ensure_running()?;
        self.status = status;
        self.result = payload;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(TaskError::AlreadyTerminal(self.id.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] on {} at {} ({})",
            self.task_type, self.id, self.subject, self.stage, self.status
        )
    }
}
