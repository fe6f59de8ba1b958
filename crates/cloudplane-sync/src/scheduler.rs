//! Periodic driver that sweeps registered resource types

use crate::driver::{RegionalResource, SyncAllOptions, SyncReport};
use crate::error::Result;
use crate::model::Actor;
use crate::reconcile::{PassOptions, Reconciler};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A unit of scheduled synchronization
#[async_trait]
pub trait SyncJob: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        reconciler: &Reconciler,
        actor: &Actor,
        options: &SyncAllOptions,
    ) -> Result<SyncReport>;
}

#[async_trait]
impl<T> SyncJob for T
where
    T: RegionalResource,
{
    fn name(&self) -> &str {
        self.resource_type()
    }

    async fn run(
        &self,
        reconciler: &Reconciler,
        actor: &Actor,
        options: &SyncAllOptions,
    ) -> Result<SyncReport> {
        reconciler.sync_all(self, actor, options).await
    }
}

/// Runs every registered job on a fixed interval
pub struct SyncScheduler {
    reconciler: Reconciler,
    jobs: Vec<Arc<dyn SyncJob>>,
    interval: Duration,
    actor: Actor,
    region_id: Option<String>,
    pass_timeout: Option<Duration>,
    only_if_empty_on_start: bool,
}

impl SyncScheduler {
    pub fn new(reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            jobs: Vec::new(),
            interval,
            actor: Actor::system(),
            region_id: None,
            pass_timeout: None,
            only_if_empty_on_start: false,
        }
    }

    pub fn with_job(mut self, job: Arc<dyn SyncJob>) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_region(mut self, region_id: Option<String>) -> Self {
        self.region_id = region_id;
        self
    }

    pub fn with_pass_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pass_timeout = timeout;
        self
    }

    /// Apply the sync-if-empty guard to the first sweep after start-up
    pub fn only_if_empty_on_start(mut self, enabled: bool) -> Self {
        self.only_if_empty_on_start = enabled;
        self
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    /// Run every job once. Jobs run one after another; a failing job does not
    /// stop the rest.
    pub async fn run_once(
        &self,
        first_run: bool,
        cancel: Option<&CancellationToken>,
    ) -> Vec<(String, Result<SyncReport>)> {
        let options = self.options(first_run, cancel);
        let mut reports = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let report = job.run(&self.reconciler, &self.actor, &options).await;
            if let Err(e) = &report {
                tracing::error!("Sync job {} failed: {}", job.name(), e);
            }
            reports.push((job.name().to_string(), report));
        }
        reports
    }

    /// Sweep on every tick until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first_run = true;

        tracing::info!(
            "Sync scheduler started: {} job(s) every {:?}",
            self.jobs.len(),
            self.interval
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_once(first_run, Some(&cancel)).await;
                    first_run = false;
                }
            }
        }
        tracing::info!("Sync scheduler stopped");
    }

    fn options(&self, first_run: bool, cancel: Option<&CancellationToken>) -> SyncAllOptions {
        let mut pass = PassOptions::new();
        pass.cancel = cancel.cloned();
        pass.timeout = self.pass_timeout;
        SyncAllOptions {
            region_id: self.region_id.clone(),
            only_if_empty: first_run && self.only_if_empty_on_start,
            pass,
        }
    }
}
