//! Control-plane settings

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root of `cloudplane.yaml`. Every section may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlPlaneConfig {
    pub lock: LockConfig,
    pub sync: SyncConfig,
    pub meta: MetaConfig,
    pub regions: Vec<RegionSeed>,
    pub task: TaskConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Resource key lock acquire deadline
    pub timeout_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Scheduler period
    pub interval_secs: u64,
    /// Skip the first sweep after start-up when local records already exist
    pub only_if_empty_on_start: bool,
    /// Restrict every sweep to one region id
    pub region: Option<String>,
    /// Deadline of a single region pass
    pub pass_timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            only_if_empty_on_start: false,
            region: None,
            pass_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaConfig {
    /// Provider SKU metadata document (JSON)
    pub nat_skus_path: PathBuf,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            nat_skus_path: PathBuf::from("meta/nat_skus.json"),
        }
    }
}

/// A region known to the control plane at start-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSeed {
    pub id: String,
    pub name: String,
    pub external_id: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    /// Resume tasks left running by a previous process
    pub resume_on_start: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            resume_on_start: true,
        }
    }
}

impl ControlPlaneConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock.timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn pass_timeout(&self) -> Option<Duration> {
        self.sync.pass_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sync.pass_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "sync.pass_timeout_secs must be greater than 0".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for region in &self.regions {
            if region.id.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "region {} has an empty id",
                    region.name
                )));
            }
            if !seen.insert(region.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "region id {} listed twice",
                    region.id
                )));
            }
        }
        if let Some(region) = &self.sync.region {
            if !self.regions.is_empty() && !self.regions.iter().any(|r| &r.id == region) {
                return Err(ConfigError::Invalid(format!(
                    "sync.region {} is not a configured region",
                    region
                )));
            }
        }
        Ok(())
    }
}
