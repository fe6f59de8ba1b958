//! Task handlers and the stage execution loop

use crate::error::{Result, TaskError};
use crate::opslog::{OpsAction, OpsEvent, OpsLog, emit};
use crate::stage::{StageContext, TaskStage, Transition};
use crate::store::TaskStore;
use crate::task::Task;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

/// Behaviour of one task type
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    type Stage: TaskStage;
    type Subject: Send + Sync;

    /// Registry name of the task type
    fn task_type(&self) -> &'static str;

    /// Load the object the task operates on
    async fn load_subject(&self, task: &Task) -> Result<Self::Subject>;

    /// Run one stage. Must end with exactly one transition call on `ctx`.
    async fn on_stage(
        &self,
        stage: Self::Stage,
        subject: &Self::Subject,
        ctx: &mut StageContext<Self::Stage>,
    ) -> Result<()>;
}

/// Collaborators the execution loop persists and reports through
pub(crate) struct Runtime<'a> {
    pub store: &'a dyn TaskStore,
    pub ops_log: &'a Arc<dyn OpsLog>,
}

/// Object-safe view of a [`TaskHandler`] for the registry
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    fn task_type(&self) -> &'static str;

    fn init_stage(&self) -> &'static str;

    /// Drive `task` until it is terminal or suspended at a scheduled stage
    async fn execute(&self, task: &mut Task, rt: &Runtime<'_>) -> Result<()>;
}

pub(crate) struct Erased<H>(pub H);

#[async_trait]
impl<H: TaskHandler> ErasedHandler for Erased<H> {
    fn task_type(&self) -> &'static str {
        self.0.task_type()
    }

    fn init_stage(&self) -> &'static str {
        H::Stage::INIT.name()
    }

    async fn execute(&self, task: &mut Task, rt: &Runtime<'_>) -> Result<()> {
        let subject = match self.0.load_subject(task).await {
            Ok(subject) => subject,
            Err(e) => {
                tracing::warn!("Task {} cannot load its subject: {}", task.id, e);
                let payload = json!({ "error": e.to_string() });
                finish(task, Transition::<H::Stage>::Failed(payload), rt).await?;
                return Err(e);
            }
        };

        loop {
            let Some(stage) = H::Stage::from_name(task.stage()) else {
                let err = TaskError::UnknownStage {
                    task_type: task.task_type.clone(),
                    stage: task.stage().to_string(),
                };
                let payload = json!({ "error": err.to_string() });
                finish(task, Transition::<H::Stage>::Failed(payload), rt).await?;
                return Err(err);
            };

            tracing::debug!("Task {} ({}) enter stage {}", task.id, task.task_type, stage.name());
            let mut ctx = StageContext::new(task, stage, Arc::clone(rt.ops_log));
            let run = self.0.on_stage(stage, &subject, &mut ctx).await;
            let outcome = ctx.finish();

            let (transition, violation) = match (run, outcome.transition) {
                (_, Some(t)) if t.is_terminal() => (t, outcome.violation),
                (Err(e), _) => {
                    tracing::warn!("Task {} stage {} failed: {}", task.id, stage.name(), e);
                    (Transition::Failed(json!({ "error": e.to_string() })), outcome.violation)
                }
                (Ok(()), Some(t)) => match outcome.violation {
                    Some(msg) => (violation_payload(&msg), Some(msg)),
                    None => (t, None),
                },
                (Ok(()), None) => {
                    let msg = format!(
                        "stage {} of task {} returned without a transition",
                        stage.name(),
                        task.id
                    );
                    tracing::error!("{}", msg);
                    (violation_payload(&msg), Some(msg))
                }
            };

            let resume = finish(task, transition, rt).await?;
            if let Some(msg) = violation {
                return Err(TaskError::ContractViolation(msg));
            }
            if !resume {
                return Ok(());
            }
        }
    }
}

fn violation_payload<S>(msg: &str) -> Transition<S> {
    Transition::Failed(json!({ "error": format!("contract violation: {}", msg) }))
}

/// Apply a transition, persist it and report it. Returns whether the loop
/// should run the next stage right away.
async fn finish<S: TaskStage>(
    task: &mut Task,
    transition: Transition<S>,
    rt: &Runtime<'_>,
) -> Result<bool> {
    let (resume, action, payload, success) = match transition {
        Transition::Advance(next) => {
            task.set_stage(next.name())?;
            (true, OpsAction::StageEnter, Some(Value::from(next.name())), true)
        }
        Transition::Schedule(next) => {
            task.set_stage(next.name())?;
            (false, OpsAction::StageEnter, Some(Value::from(next.name())), true)
        }
        Transition::Complete(payload) => {
            task.complete(payload.clone())?;
            tracing::info!("Task {} complete", task);
            (false, OpsAction::TaskComplete, payload, true)
        }
        Transition::Failed(payload) => {
            task.fail(payload.clone())?;
            tracing::warn!("Task {} failed: {}", task, payload);
            (false, OpsAction::TaskFailed, Some(payload), false)
        }
    };

    rt.store.update(task).await?;
    let event = OpsEvent::new(
        task.subject.clone(),
        action,
        payload,
        task.actor.clone(),
        success,
    );
    emit(rt.ops_log.as_ref(), event).await;
    Ok(resume)
}
