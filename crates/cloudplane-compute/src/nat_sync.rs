//! NAT SKU reconciliation across regions

use crate::meta::SkuResourcesMeta;
use crate::nat_sku::{NatSkuTable, RegionNatSkus};
use crate::region::RegionTable;
use async_trait::async_trait;
use cloudplane_sync::{
    Actor, Reconciler, Region, RegionalResource, Result, SyncAllOptions, SyncError, SyncReport,
};
use std::path::PathBuf;
use std::sync::Arc;

pub const NAT_SKU_RESOURCE: &str = "nat_sku";

/// Where the SKU metadata comes from
#[derive(Debug, Clone)]
pub enum MetaSource {
    /// JSON document read at the start of every sweep
    File(PathBuf),
    /// Fixed metadata
    Static(Arc<SkuResourcesMeta>),
}

/// NAT SKUs as a regionally reconciled resource
pub struct NatSkuSync {
    regions: Arc<RegionTable>,
    skus: Arc<NatSkuTable>,
    meta: MetaSource,
}

impl NatSkuSync {
    pub fn new(regions: Arc<RegionTable>, skus: Arc<NatSkuTable>, meta: MetaSource) -> Self {
        Self {
            regions,
            skus,
            meta,
        }
    }

    pub fn skus(&self) -> &Arc<NatSkuTable> {
        &self.skus
    }
}

#[async_trait]
impl RegionalResource for NatSkuSync {
    type Source = Arc<SkuResourcesMeta>;
    type Store = RegionNatSkus;

    fn resource_type(&self) -> &str {
        NAT_SKU_RESOURCE
    }

    async fn list_regions(&self, region_id: Option<&str>) -> Result<Vec<Region>> {
        Ok(self
            .regions
            .list_public(region_id)?
            .iter()
            .map(|r| r.to_region())
            .collect())
    }

    fn is_supported(&self, region: &Region) -> bool {
        crate::region::provider_capabilities(&region.provider).nat_gateway
    }

    async fn count_local(&self, region_id: Option<&str>) -> Result<usize> {
        Ok(self.skus.count(region_id)?)
    }

    async fn external_source(&self) -> Result<Arc<SkuResourcesMeta>> {
        match &self.meta {
            MetaSource::Static(meta) => Ok(Arc::clone(meta)),
            MetaSource::File(path) => SkuResourcesMeta::load(path)
                .await
                .map(Arc::new)
                .map_err(|e| SyncError::Provider(format!("FetchSkuResourcesMeta: {}", e))),
        }
    }

    fn local_store(&self, region: &Region) -> RegionNatSkus {
        RegionNatSkus::new(Arc::clone(&self.skus), region.clone())
    }
}

/// Sweep NAT SKUs for every supported region, or only `options.region_id`
pub async fn sync_nat_skus(
    reconciler: &Reconciler,
    sync: &NatSkuSync,
    actor: &Actor,
    options: &SyncAllOptions,
) -> Result<SyncReport> {
    let report = reconciler.sync_all(sync, actor, options).await?;
    if report.skipped_existing {
        tracing::debug!("SyncRegionNatSkus synced skus, skip...");
    }
    Ok(report)
}
