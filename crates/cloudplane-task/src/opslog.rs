//! Operation (audit) log
//!
//! Events are fire-and-forget: an emission failure is logged and never rolls
//! back the transition that produced it.

use crate::error::{Result, TaskError};
use crate::task::SubjectRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_sync::Actor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpsAction {
    Delete,
    DeleteFail,
    SyncSkus,
    SyncSkusFail,
    StageEnter,
    TaskComplete,
    TaskFailed,
}

impl OpsAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpsAction::Delete => "delete",
            OpsAction::DeleteFail => "delete_fail",
            OpsAction::SyncSkus => "sync_skus",
            OpsAction::SyncSkusFail => "sync_skus_fail",
            OpsAction::StageEnter => "stage_enter",
            OpsAction::TaskComplete => "task_complete",
            OpsAction::TaskFailed => "task_failed",
        }
    }
}

impl fmt::Display for OpsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsEvent {
    pub subject: SubjectRef,
    pub action: OpsAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub actor: Actor,
    pub success: bool,
    pub at: DateTime<Utc>,
}

impl OpsEvent {
    pub fn new(
        subject: SubjectRef,
        action: OpsAction,
        payload: Option<Value>,
        actor: Actor,
        success: bool,
    ) -> Self {
        Self {
            subject,
            action,
            payload,
            actor,
            success,
            at: Utc::now(),
        }
    }
}

/// Audit log sink
#[async_trait]
pub trait OpsLog: Send + Sync {
    async fn log_event(&self, event: OpsEvent) -> Result<()>;
}

/// Emit `event`, logging instead of propagating a sink failure
pub async fn emit(log: &dyn OpsLog, event: OpsEvent) {
    let action = event.action.clone();
    if let Err(e) = log.log_event(event).await {
        tracing::warn!("Failed to record {} event: {}", action, e);
    }
}

/// Writes audit events as structured tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOpsLog;

#[async_trait]
impl OpsLog for TracingOpsLog {
    async fn log_event(&self, event: OpsEvent) -> Result<()> {
        let payload = event.payload.as_ref().map(Value::to_string);
        tracing::info!(
            target: "cloudplane::opslog",
            kind = %event.subject.kind,
            id = %event.subject.id,
            name = %event.subject.name,
            action = %event.action,
            user = %event.actor,
            success = event.success,
            payload = payload.as_deref().unwrap_or(""),
            "ops event"
        );
        Ok(())
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemoryOpsLog {
    events: Mutex<Vec<OpsEvent>>,
    fail: bool,
}

impl MemoryOpsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every event
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<OpsEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<OpsAction> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl OpsLog for MemoryOpsLog {
    async fn log_event(&self, event: OpsEvent) -> Result<()> {
        if self.fail {
            return Err(TaskError::Store("ops log unavailable".to_string()));
        }
        self.events
            .lock()
            .map_err(|e| TaskError::Store(e.to_string()))?
            .push(event);
        Ok(())
    }
}
