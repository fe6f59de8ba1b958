//! Process-wide assembly of tables, engines and tasks

use crate::alert::{AlertTable, DELETE_ALERT_TASK};
use crate::error::Result;
use crate::nat_sku::NatSkuTable;
use crate::nat_sync::{MetaSource, NatSkuSync};
use crate::region::RegionTable;
use crate::sync_task::{SYNC_SKUS_TASK, SyncSkusParams, SyncSkusTask, sync_skus_subject};
use cloudplane_config::ControlPlaneConfig;
use cloudplane_sync::{Actor, KeyLock, Reconciler, SyncScheduler};
use cloudplane_task::{
    DeleteWithDependentsTask, MemoryTaskStore, OpsLog, Task, TaskManager, TaskRegistry, TaskStore,
};
use std::sync::Arc;

pub struct ControlPlane {
    config: ControlPlaneConfig,
    regions: Arc<RegionTable>,
    alerts: Arc<AlertTable>,
    nat_sync: Arc<NatSkuSync>,
    reconciler: Reconciler,
    tasks: TaskManager,
}

impl ControlPlane {
    /// Assemble with SKU metadata read from `meta.nat_skus_path`
    pub fn from_config(config: ControlPlaneConfig, ops_log: Arc<dyn OpsLog>) -> Result<Self> {
        let meta = MetaSource::File(config.meta.nat_skus_path.clone());
        Self::with_meta(config, meta, ops_log)
    }

    /// Assemble with an in-memory task store. Tasks do not outlive the
    /// process, so there is nothing to resume on the next start.
    pub fn with_meta(
        config: ControlPlaneConfig,
        meta: MetaSource,
        ops_log: Arc<dyn OpsLog>,
    ) -> Result<Self> {
        Self::with_task_store(config, meta, ops_log, Arc::new(MemoryTaskStore::new()))
    }

    /// Assemble on top of an existing task store, e.g. one that keeps
    /// tasks across restarts for `resume_unfinished`
    pub fn with_task_store(
        config: ControlPlaneConfig,
        meta: MetaSource,
        ops_log: Arc<dyn OpsLog>,
        task_store: Arc<dyn TaskStore>,
    ) -> Result<Self> {
        let locks = KeyLock::with_timeout(Some(config.lock_timeout()));
        let reconciler = Reconciler::new(locks.clone());

        let regions = Arc::new(RegionTable::from_seeds(&config.regions)?);
        let skus = Arc::new(NatSkuTable::new());
        let alerts = Arc::new(AlertTable::new());
        let nat_sync = Arc::new(NatSkuSync::new(Arc::clone(&regions), skus, meta));

        let registry = TaskRegistry::builder()
            .register(SyncSkusTask::new(reconciler.clone(), Arc::clone(&nat_sync)))?
            .register(DeleteWithDependentsTask::new(Arc::clone(&alerts)))?
            .build();
        tracing::debug!("Task types: {:?}", registry.task_types());

        let tasks = TaskManager::new(registry, task_store, ops_log, locks);

        Ok(Self {
            config,
            regions,
            alerts,
            nat_sync,
            reconciler,
            tasks,
        })
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    pub fn regions(&self) -> &Arc<RegionTable> {
        &self.regions
    }

    pub fn alerts(&self) -> &Arc<AlertTable> {
        &self.alerts
    }

    pub fn nat_skus(&self) -> &Arc<NatSkuTable> {
        self.nat_sync.skus()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Periodic NAT SKU sweeps as configured under `sync`
    pub fn scheduler(&self) -> SyncScheduler {
        let sync = &self.config.sync;
        SyncScheduler::new(self.reconciler.clone(), self.config.sync_interval())
            .with_job(self.nat_sync.clone())
            .with_region(sync.region.clone())
            .with_pass_timeout(self.config.pass_timeout())
            .only_if_empty_on_start(sync.only_if_empty_on_start)
    }

    /// Run a NAT SKU sync through a sync-skus task and return the finished task
    pub async fn sync_nat_skus(
        &self,
        actor: &Actor,
        region_id: Option<String>,
        only_if_empty: bool,
    ) -> Result<Task> {
        let params = SyncSkusParams {
            region_id,
            only_if_empty,
            pass_timeout_secs: self.config.sync.pass_timeout_secs,
            ..SyncSkusParams::nat_skus()
        };
        let task = self
            .tasks
            .start_task(
                SYNC_SKUS_TASK,
                sync_skus_subject(),
                actor,
                serde_json::to_value(params)?,
            )
            .await?;
        Ok(task)
    }

    /// Delete an alert and its records through a deletion task
    pub async fn delete_alert(&self, actor: &Actor, alert_id: &str) -> Result<Task> {
        let alert = self.alerts.get_alert(alert_id)?;
        let task = self
            .tasks
            .start_task(
                DELETE_ALERT_TASK,
                alert.subject(),
                actor,
                serde_json::Value::Null,
            )
            .await?;
        Ok(task)
    }
}
