//! Cloud regions and per-provider capabilities

use crate::error::{ComputeError, Result};
use chrono::{DateTime, Utc};
use cloudplane_config::RegionSeed;
use cloudplane_sync::Region;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// What a provider driver can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Public cloud (as opposed to on-premise)
    pub public: bool,
    pub nat_gateway: bool,
}

/// Capabilities of a provider, matched case-insensitively
pub fn provider_capabilities(provider: &str) -> ProviderCapabilities {
    match provider.to_ascii_lowercase().as_str() {
        "aliyun" | "huawei" | "qcloud" | "aws" | "azure" => ProviderCapabilities {
            public: true,
            nat_gateway: true,
        },
        "google" | "ucloud" | "ctyun" | "jdcloud" => ProviderCapabilities {
            public: true,
            nat_gateway: false,
        },
        _ => ProviderCapabilities {
            public: false,
            nat_gateway: false,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cloudregion {
    pub id: String,
    pub name: String,
    pub external_id: String,
    pub provider: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Cloudregion {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        external_id: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            external_id: external_id.into(),
            provider: provider.into(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    pub fn capabilities(&self) -> ProviderCapabilities {
        provider_capabilities(&self.provider)
    }

    pub fn supports_nat_gateway(&self) -> bool {
        self.capabilities().nat_gateway
    }

    pub fn to_region(&self) -> Region {
        Region::new(&self.id, &self.name, &self.external_id, &self.provider)
    }
}

impl From<&RegionSeed> for Cloudregion {
    fn from(seed: &RegionSeed) -> Self {
        Cloudregion::new(&seed.id, &seed.name, &seed.external_id, &seed.provider)
    }
}

/// Region table
#[derive(Debug, Default)]
pub struct RegionTable {
    regions: Mutex<Vec<Cloudregion>>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seeds(seeds: &[RegionSeed]) -> Result<Self> {
        let table = Self::new();
        for seed in seeds {
            table.insert(seed.into())?;
        }
        Ok(table)
    }

    fn rows(&self) -> Result<MutexGuard<'_, Vec<Cloudregion>>> {
        self.regions
            .lock()
            .map_err(|e| ComputeError::Poisoned(e.to_string()))
    }

    pub fn insert(&self, region: Cloudregion) -> Result<()> {
        let mut rows = self.rows()?;
        if rows.iter().any(|r| r.id == region.id) {
            return Err(ComputeError::Duplicate(region.id));
        }
        rows.push(region);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Cloudregion> {
        self.rows()?
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ComputeError::RegionNotFound(id.to_string()))
    }

    /// Enabled regions of public providers, restricted to `region_id` when given
    pub fn list_public(&self, region_id: Option<&str>) -> Result<Vec<Cloudregion>> {
        if let Some(id) = region_id {
            // an explicit unknown id is an error, not an empty sweep
            self.get(id)?;
        }
        Ok(self
            .rows()?
            .iter()
            .filter(|r| r.enabled && r.capabilities().public)
            .filter(|r| region_id.is_none_or(|id| r.id == id))
            .cloned()
            .collect())
    }

    pub fn len(&self) -> usize {
        self.rows().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
