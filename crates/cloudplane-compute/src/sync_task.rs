//! "sync-skus" as a task

use crate::nat_sync::{NAT_SKU_RESOURCE, NatSkuSync, sync_nat_skus};
use async_trait::async_trait;
use cloudplane_sync::{PassOptions, Reconciler, SyncAllOptions, SyncReport};
use cloudplane_task::{
    OpsAction, Result, StageContext, SubjectRef, Task, TaskHandler, TaskStage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const SYNC_SKUS_TASK: &str = "SyncSkusTask";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSkusStage {
    Init,
    SyncRegions,
}

impl TaskStage for SyncSkusStage {
    const INIT: Self = SyncSkusStage::Init;

    fn name(&self) -> &'static str {
        match self {
            SyncSkusStage::Init => "init",
            SyncSkusStage::SyncRegions => "sync_regions",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "init" => Some(SyncSkusStage::Init),
            "sync_regions" => Some(SyncSkusStage::SyncRegions),
            _ => None,
        }
    }
}

/// Task parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSkusParams {
    /// Resource keyword; only "nat_sku" is handled
    pub resource: String,
    pub region_id: Option<String>,
    pub only_if_empty: bool,
    pub pass_timeout_secs: Option<u64>,
}

impl SyncSkusParams {
    pub fn nat_skus() -> Self {
        Self {
            resource: NAT_SKU_RESOURCE.to_string(),
            ..Default::default()
        }
    }
}

/// Subject used for sync-skus tasks
pub fn sync_skus_subject() -> SubjectRef {
    SubjectRef::new(NAT_SKU_RESOURCE, NAT_SKU_RESOURCE, "nat_skus")
}

/// Runs a NAT SKU sweep; any failed region fails the task
pub struct SyncSkusTask {
    reconciler: Reconciler,
    sync: Arc<NatSkuSync>,
}

impl SyncSkusTask {
    pub fn new(reconciler: Reconciler, sync: Arc<NatSkuSync>) -> Self {
        Self { reconciler, sync }
    }

    async fn fail(&self, ctx: &mut StageContext<SyncSkusStage>, payload: Value) -> Result<()> {
        ctx.log_event(OpsAction::SyncSkusFail, Some(payload.clone()), false)
            .await;
        ctx.set_stage_failed(payload)
    }
}

fn report_payload(report: &SyncReport) -> Value {
    let (added, updated, deleted) = report.totals();
    let regions: Vec<String> = report.regions.iter().map(ToString::to_string).collect();
    json!({
        "resource": report.resource_type,
        "skipped_existing": report.skipped_existing,
        "added": added,
        "updated": updated,
        "deleted": deleted,
        "regions": regions,
    })
}

#[async_trait]
impl TaskHandler for SyncSkusTask {
    type Stage = SyncSkusStage;
    type Subject = ();

    fn task_type(&self) -> &'static str {
        SYNC_SKUS_TASK
    }

    async fn load_subject(&self, _task: &Task) -> Result<()> {
        Ok(())
    }

    async fn on_stage(
        &self,
        stage: SyncSkusStage,
        _subject: &(),
        ctx: &mut StageContext<SyncSkusStage>,
    ) -> Result<()> {
        let params: SyncSkusParams = serde_json::from_value(ctx.params().clone())?;
        match stage {
            SyncSkusStage::Init => {
                if params.resource != NAT_SKU_RESOURCE {
                    let payload = json!({
                        "error": format!("unsupported resource {:?}", params.resource)
                    });
                    return self.fail(ctx, payload).await;
                }
                ctx.advance(SyncSkusStage::SyncRegions)
            }
            SyncSkusStage::SyncRegions => {
                let mut pass = PassOptions::new();
                if let Some(secs) = params.pass_timeout_secs {
                    pass = pass.with_timeout(Duration::from_secs(secs));
                }
                let options = SyncAllOptions {
                    region_id: params.region_id,
                    only_if_empty: params.only_if_empty,
                    pass,
                };

                let actor = ctx.actor().clone();
                let report =
                    match sync_nat_skus(&self.reconciler, &self.sync, &actor, &options).await {
                        Ok(report) => report,
                        Err(e) => {
                            tracing::error!("SyncRegionNatSkus error: {}", e);
                            return self.fail(ctx, json!({ "error": e.to_string() })).await;
                        }
                    };

                let mut payload = report_payload(&report);
                let failed: Vec<String> = report
                    .failed_regions()
                    .iter()
                    .map(|r| r.to_string())
                    .collect();
                if !failed.is_empty() {
                    payload["error"] = json!(format!("{} region(s) failed", failed.len()));
                    payload["failed_regions"] = json!(failed);
                    return self.fail(ctx, payload).await;
                }

                ctx.log_event(OpsAction::SyncSkus, Some(payload.clone()), true)
                    .await;
                ctx.set_stage_complete(Some(payload))
            }
        }
    }
}
