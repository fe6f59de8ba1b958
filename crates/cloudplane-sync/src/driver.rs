//! Region sweep: run one reconciliation pass per eligible region

use crate::capability::{ExternalFetcher, LocalStore};
use crate::error::Result;
use crate::model::{Actor, Region, SyncScope};
use crate::reconcile::{PassOptions, Reconciler};
use crate::result::SyncResult;
use async_trait::async_trait;
use std::fmt;

/// A resource type that is reconciled region by region
#[async_trait]
pub trait RegionalResource: Send + Sync {
    type Source: ExternalFetcher;
    type Store: LocalStore<<Self::Source as ExternalFetcher>::Observation>;

    /// Resource type keyword, also the lock namespace (e.g. "nat_sku")
    fn resource_type(&self) -> &str;

    /// Regions to sweep, restricted to `region_id` when given
    async fn list_regions(&self, region_id: Option<&str>) -> Result<Vec<Region>>;

    /// Whether the region's provider driver supports this resource type
    fn is_supported(&self, region: &Region) -> bool;

    /// Number of local records, restricted to `region_id` when given
    async fn count_local(&self, region_id: Option<&str>) -> Result<usize>;

    /// Provider-side source, prepared once per sweep and shared by all regions
    async fn external_source(&self) -> Result<Self::Source>;

    /// Local persistence bound to one region
    fn local_store(&self, region: &Region) -> Self::Store;
}

/// Options for [`Reconciler::sync_all`]
#[derive(Debug, Clone, Default)]
pub struct SyncAllOptions {
    pub region_id: Option<String>,
    /// Skip the sweep when local records already exist
    pub only_if_empty: bool,
    /// Applied to every region pass
    pub pass: PassOptions,
}

impl SyncAllOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, region_id: impl Into<String>) -> Self {
        self.region_id = Some(region_id.into());
        self
    }

    pub fn only_if_empty(mut self, only_if_empty: bool) -> Self {
        self.only_if_empty = only_if_empty;
        self
    }

    pub fn pass(mut self, pass: PassOptions) -> Self {
        self.pass = pass;
        self
    }
}

/// What happened to one region during a sweep
#[derive(Debug)]
pub enum RegionOutcome {
    /// The provider does not offer this resource type in the region
    Unsupported,
    Synced(SyncResult),
}

#[derive(Debug)]
pub struct RegionReport {
    pub region: Region,
    pub outcome: RegionOutcome,
}

impl RegionReport {
    pub fn result(&self) -> Option<&SyncResult> {
        match &self.outcome {
            RegionOutcome::Synced(result) => Some(result),
            RegionOutcome::Unsupported => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.result().map(SyncResult::is_fatal).unwrap_or(false)
    }
}

impl fmt::Display for RegionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            RegionOutcome::Unsupported => {
                write!(f, "region {}({}) unsupported, skipped", self.region.name, self.region.id)
            }
            RegionOutcome::Synced(result) => {
                write!(f, "region {}({}): {}", self.region.name, self.region.id, result)
            }
        }
    }
}

/// Outcome of a whole sweep
#[derive(Debug)]
pub struct SyncReport {
    pub resource_type: String,
    /// The sweep was skipped by the sync-if-empty guard
    pub skipped_existing: bool,
    pub regions: Vec<RegionReport>,
}

impl SyncReport {
    fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            skipped_existing: false,
            regions: Vec::new(),
        }
    }

    pub fn failed_regions(&self) -> Vec<&RegionReport> {
        self.regions.iter().filter(|r| r.is_failed()).collect()
    }

    pub fn synced_regions(&self) -> usize {
        self.regions.iter().filter(|r| r.result().is_some()).count()
    }

    /// (added, updated, deleted) summed over all regions
    pub fn totals(&self) -> (usize, usize, usize) {
        self.regions
            .iter()
            .filter_map(RegionReport::result)
            .fold((0, 0, 0), |(a, u, d), r| {
                (a + r.added(), u + r.updated(), d + r.deleted())
            })
    }
}

impl Reconciler {
    /// Sweep every eligible region of `resource`.
    ///
    /// A failing region is reported and the sweep moves on. Listing regions
    /// or preparing the provider source fails the whole sweep.
    pub async fn sync_all<T>(
        &self,
        resource: &T,
        actor: &Actor,
        options: &SyncAllOptions,
    ) -> Result<SyncReport>
    where
        T: RegionalResource + ?Sized,
    {
        let resource_type = resource.resource_type();
        let mut report = SyncReport::new(resource_type);
        let region_id = options.region_id.as_deref();

        if options.only_if_empty {
            let count = resource.count_local(region_id).await?;
            if count > 0 {
                tracing::debug!("{} already synced ({} records), skip...", resource_type, count);
                report.skipped_existing = true;
                return Ok(report);
            }
        }

        let regions = resource.list_regions(region_id).await?;
        let source = resource.external_source().await?;

        for region in regions {
            if options
                .pass
                .cancel
                .as_ref()
                .is_some_and(|c| c.is_cancelled())
            {
                tracing::warn!("{} sweep cancelled before region {}", resource_type, region.id);
                break;
            }

            if !resource.is_supported(&region) {
                tracing::info!(
                    "region {}({}) does not support {}, skip sync",
                    region.name,
                    region.id,
                    resource_type
                );
                report.regions.push(RegionReport {
                    region,
                    outcome: RegionOutcome::Unsupported,
                });
                continue;
            }

            let scope = SyncScope::new(resource_type, &region);
            let store = resource.local_store(&region);
            let result = self
                .reconcile_with(&scope, actor, &source, &store, &options.pass)
                .await;

            if result.is_fatal() {
                tracing::error!(
                    "Sync {} for region {} failed: {}",
                    resource_type,
                    region.name,
                    result
                );
            } else {
                tracing::info!(
                    "Sync {} for region {} result: {}",
                    resource_type,
                    region.name,
                    result
                );
            }
            report.regions.push(RegionReport {
                region,
                outcome: RegionOutcome::Synced(result),
            });
        }

        Ok(report)
    }
}
