//! Stage identifiers and the per-stage transition guard

use crate::error::{Result, TaskError};
use crate::opslog::{OpsAction, OpsEvent, OpsLog, emit};
use crate::task::{SubjectRef, Task};
use cloudplane_sync::Actor;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The stages of one task type, dispatched with an exhaustive `match`.
///
/// Stage names are persisted with the task, so `from_name(s.name())` must
/// return `Some(s)` for every stage.
pub trait TaskStage: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Entry stage of a new task
    const INIT: Self;

    fn name(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self>;
}

/// What a stage handler decided
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<S> {
    /// Run `S` right away in the same execution
    Advance(S),
    /// Persist `S` and return; a later run resumes there
    Schedule(S),
    Complete(Option<Value>),
    Failed(Value),
}

impl<S: TaskStage> Transition<S> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Complete(_) | Transition::Failed(_))
    }

    fn describe(&self) -> String {
        match self {
            Transition::Advance(s) => format!("advance to {}", s.name()),
            Transition::Schedule(s) => format!("schedule {}", s.name()),
            Transition::Complete(_) => "set_stage_complete".to_string(),
            Transition::Failed(_) => "set_stage_failed".to_string(),
        }
    }
}

/// Handle given to a stage handler.
///
/// Exactly one of [`advance`](Self::advance), [`schedule`](Self::schedule),
/// [`set_stage_complete`](Self::set_stage_complete) or
/// [`set_stage_failed`](Self::set_stage_failed) must be called. A second call
/// is rejected with [`TaskError::ContractViolation`] and the first one stands.
pub struct StageContext<S> {
    task_id: String,
    stage: S,
    subject: SubjectRef,
    actor: Actor,
    params: Value,
    ops_log: Arc<dyn OpsLog>,
    transition: Option<Transition<S>>,
    violation: Option<String>,
}

impl<S: TaskStage> StageContext<S> {
    pub(crate) fn new(task: &Task, stage: S, ops_log: Arc<dyn OpsLog>) -> Self {
        Self {
            task_id: task.id.clone(),
            stage,
            subject: task.subject.clone(),
            actor: task.actor.clone(),
            params: task.params.clone(),
            ops_log,
            transition: None,
            violation: None,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn stage(&self) -> S {
        self.stage
    }

    pub fn subject(&self) -> &SubjectRef {
        &self.subject
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn advance(&mut self, next: S) -> Result<()> {
        self.record(Transition::Advance(next))
    }

    pub fn schedule(&mut self, next: S) -> Result<()> {
        self.record(Transition::Schedule(next))
    }

    pub fn set_stage_complete(&mut self, payload: Option<Value>) -> Result<()> {
        self.record(Transition::Complete(payload))
    }

    pub fn set_stage_failed(&mut self, payload: impl Into<Value>) -> Result<()> {
        self.record(Transition::Failed(payload.into()))
    }

    /// Record an audit event about the task subject
    pub async fn log_event(&self, action: OpsAction, payload: Option<Value>, success: bool) {
        let event = OpsEvent::new(
            self.subject.clone(),
            action,
            payload,
            self.actor.clone(),
            success,
        );
        emit(self.ops_log.as_ref(), event).await;
    }

    fn record(&mut self, transition: Transition<S>) -> Result<()> {
        if let Some(first) = &self.transition {
            let msg = format!(
                "stage {} of task {} called {} after {}",
                self.stage.name(),
                self.task_id,
                transition.describe(),
                first.describe()
            );
            tracing::error!("{}", msg);
            self.violation.get_or_insert_with(|| msg.clone());
            return Err(TaskError::ContractViolation(msg));
        }
        self.transition = Some(transition);
        Ok(())
    }

    pub(crate) fn finish(self) -> StageOutcome<S> {
        StageOutcome {
            transition: self.transition,
            violation: self.violation,
        }
    }
}

pub(crate) struct StageOutcome<S> {
    pub transition: Option<Transition<S>>,
    pub violation: Option<String>,
}
