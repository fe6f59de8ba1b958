//! Delete an object after removing the records that depend on it

use crate::error::{Result, TaskError};
use crate::handler::TaskHandler;
use crate::opslog::OpsAction;
use crate::stage::{StageContext, TaskStage};
use crate::task::Task;
use async_trait::async_trait;
use cloudplane_sync::Actor;
use serde_json::json;
use std::sync::Arc;

/// A model whose objects own dependent records
#[async_trait]
pub trait DeletableModel: Send + Sync + 'static {
    type Object: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Registry name of the deletion task for this model
    const DELETE_TASK: &'static str;

    async fn load(&self, id: &str) -> std::result::Result<Self::Object, Self::Error>;

    /// Remove dependent records, returning every failure
    async fn delete_dependents(&self, object: &Self::Object, actor: &Actor) -> Vec<Self::Error>;

    /// Remove the object itself
    async fn real_delete(
        &self,
        object: &Self::Object,
        actor: &Actor,
    ) -> std::result::Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStage {
    Init,
}

impl TaskStage for DeleteStage {
    const INIT: Self = DeleteStage::Init;

    fn name(&self) -> &'static str {
        match self {
            DeleteStage::Init => "init",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "init" => Some(DeleteStage::Init),
            _ => None,
        }
    }
}

/// Removes dependents, then the subject. Any dependent failure fails the task
/// and leaves the subject in place.
pub struct DeleteWithDependentsTask<M> {
    model: Arc<M>,
}

impl<M: DeletableModel> DeleteWithDependentsTask<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self { model }
    }

    async fn fail(
        &self,
        ctx: &mut StageContext<DeleteStage>,
        message: String,
        errors: Vec<String>,
    ) -> Result<()> {
        let payload = json!({ "error": message, "errors": errors });
        tracing::warn!("Delete {} failed: {}", ctx.subject(), message);
        ctx.log_event(OpsAction::DeleteFail, Some(payload.clone()), false)
            .await;
        ctx.set_stage_failed(payload)
    }
}

#[async_trait]
impl<M: DeletableModel> TaskHandler for DeleteWithDependentsTask<M> {
    type Stage = DeleteStage;
    type Subject = M::Object;

    fn task_type(&self) -> &'static str {
        M::DELETE_TASK
    }

    async fn load_subject(&self, task: &Task) -> Result<M::Object> {
        self.model
            .load(&task.subject.id)
            .await
            .map_err(|e| TaskError::SubjectNotFound(format!("{}: {}", task.subject, e)))
    }

    async fn on_stage(
        &self,
        stage: DeleteStage,
        subject: &M::Object,
        ctx: &mut StageContext<DeleteStage>,
    ) -> Result<()> {
        match stage {
            DeleteStage::Init => {
                let actor = ctx.actor().clone();
                let errs = self.model.delete_dependents(subject, &actor).await;
                if !errs.is_empty() {
                    let errors: Vec<String> = errs.iter().map(ToString::to_string).collect();
                    let message = format!(
                        "fail to delete dependents of {}: [{}]",
                        ctx.subject().name,
                        errors.join(", ")
                    );
                    return self.fail(ctx, message, errors).await;
                }

                if let Err(e) = self.model.real_delete(subject, &actor).await {
                    let message = format!("delete {} err: {}", ctx.subject().kind, e);
                    return self.fail(ctx, message, vec![e.to_string()]).await;
                }

                ctx.log_event(OpsAction::Delete, None, true).await;
                ctx.set_stage_complete(None)
            }
        }
    }
}
