//! NAT gateway SKUs: local records, provider observations and their table

use crate::error::{ComputeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_sync::{
    Actor, ApplyDelete, ApplyInsert, ApplyUpdate, Externalized, LocalFetcher, Region, SyncError,
    SyncScope,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

pub const NAT_SKU_AVAILABLE: &str = "available";
pub const NAT_SKU_SOLDOUT: &str = "soldout";

fn default_available() -> String {
    NAT_SKU_AVAILABLE.to_string()
}

/// A NAT SKU as published in the provider SKU metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudNatSku {
    /// Metadata-side id; never used as a local identity
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub external_id: String,
    pub provider: String,
    /// Provider-side region the SKU belongs to
    pub region_ext_id: String,
    #[serde(default = "default_available")]
    pub prepaid_status: String,
    #[serde(default = "default_available")]
    pub postpaid_status: String,
    #[serde(default)]
    pub cps: i64,
    #[serde(default)]
    pub conns: i64,
    #[serde(default)]
    pub pps: i64,
    #[serde(default)]
    pub throughput: i64,
    #[serde(default)]
    pub zone_ids: Option<String>,
}

impl Externalized for CloudNatSku {
    fn global_id(&self) -> &str {
        &self.external_id
    }
}

/// A NAT SKU persisted for one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatSku {
    pub id: String,
    pub name: String,
    pub status: String,
    pub enabled: bool,
    pub provider: String,
    pub external_id: String,
    pub cloudregion_id: String,
    pub prepaid_status: String,
    pub postpaid_status: String,
    pub cps: i64,
    pub conns: i64,
    pub pps: i64,
    pub throughput: i64,
    pub zone_ids: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NatSku {
    /// New record for `region` from an observation. The metadata id is
    /// discarded in favour of a fresh one.
    pub fn from_cloud(region: &Region, sku: CloudNatSku) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: sku.name,
            status: NAT_SKU_AVAILABLE.to_string(),
            enabled: true,
            provider: sku.provider,
            external_id: sku.external_id,
            cloudregion_id: region.id.clone(),
            prepaid_status: sku.prepaid_status,
            postpaid_status: sku.postpaid_status,
            cps: sku.cps,
            conns: sku.conns,
            pps: sku.pps,
            throughput: sku.throughput,
            zone_ids: sku.zone_ids,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite externally sourced fields and mark the SKU available.
    /// Identity, region and creation time are kept.
    pub fn sync_with_cloud(&mut self, sku: CloudNatSku) {
        self.name = sku.name;
        self.provider = sku.provider;
        self.prepaid_status = sku.prepaid_status;
        self.postpaid_status = sku.postpaid_status;
        self.cps = sku.cps;
        self.conns = sku.conns;
        self.pps = sku.pps;
        self.throughput = sku.throughput;
        self.zone_ids = sku.zone_ids;
        self.status = NAT_SKU_AVAILABLE.to_string();
        self.updated_at = Utc::now();
    }
}

impl Externalized for NatSku {
    fn global_id(&self) -> &str {
        &self.external_id
    }
}

/// NAT SKU table shared by all regions
#[derive(Debug, Default)]
pub struct NatSkuTable {
    rows: Mutex<Vec<NatSku>>,
}

impl NatSkuTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<MutexGuard<'_, Vec<NatSku>>> {
        self.rows
            .lock()
            .map_err(|e| ComputeError::Poisoned(e.to_string()))
    }

    pub fn insert(&self, sku: NatSku) -> Result<()> {
        let mut rows = self.rows()?;
        if rows.iter().any(|r| r.id == sku.id) {
            return Err(ComputeError::Duplicate(sku.id));
        }
        rows.push(sku);
        Ok(())
    }

    /// SKUs of one region, oldest first
    pub fn list_by_region(&self, region_id: &str) -> Result<Vec<NatSku>> {
        Ok(self
            .rows()?
            .iter()
            .filter(|r| r.cloudregion_id == region_id)
            .cloned()
            .collect())
    }

    pub fn list(&self) -> Result<Vec<NatSku>> {
        Ok(self.rows()?.clone())
    }

    /// Number of SKUs, restricted to `region_id` when given
    pub fn count(&self, region_id: Option<&str>) -> Result<usize> {
        Ok(self
            .rows()?
            .iter()
            .filter(|r| region_id.is_none_or(|id| r.cloudregion_id == id))
            .count())
    }

    pub fn update<F>(&self, id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut NatSku),
    {
        let mut rows = self.rows()?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ComputeError::Sync(SyncError::NotFound(format!("nat sku {}", id))))?;
        mutate(row);
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let mut rows = self.rows()?;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() == before {
            return Err(ComputeError::Sync(SyncError::NotFound(format!("nat sku {}", id))));
        }
        Ok(())
    }
}

/// The NAT SKU table seen from one region
pub struct RegionNatSkus {
    table: Arc<NatSkuTable>,
    region: Region,
}

impl RegionNatSkus {
    pub fn new(table: Arc<NatSkuTable>, region: Region) -> Self {
        Self { table, region }
    }
}

#[async_trait]
impl LocalFetcher for RegionNatSkus {
    type Record = NatSku;

    async fn fetch_local(&self, _scope: &SyncScope) -> cloudplane_sync::Result<Vec<NatSku>> {
        Ok(self.table.list_by_region(&self.region.id)?)
    }
}

#[async_trait]
impl ApplyDelete for RegionNatSkus {
    async fn apply_delete(&self, actor: &Actor, sku: NatSku) -> cloudplane_sync::Result<()> {
        self.table.delete(&sku.id)?;
        tracing::debug!("{} deleted nat sku {}({})", actor, sku.name, sku.external_id);
        Ok(())
    }
}

#[async_trait]
impl ApplyUpdate<CloudNatSku> for RegionNatSkus {
    async fn apply_update(
        &self,
        _actor: &Actor,
        local: NatSku,
        external: CloudNatSku,
    ) -> cloudplane_sync::Result<()> {
        self.table
            .update(&local.id, move |row| row.sync_with_cloud(external))?;
        Ok(())
    }
}

#[async_trait]
impl ApplyInsert<CloudNatSku> for RegionNatSkus {
    async fn apply_insert(&self, actor: &Actor, external: CloudNatSku) -> cloudplane_sync::Result<()> {
        let sku = NatSku::from_cloud(&self.region, external);
        tracing::debug!("{} added nat sku {}({})", actor, sku.name, sku.external_id);
        self.table.insert(sku)?;
        Ok(())
    }
}
