//! cloudplane compute wiring
//!
//! Concrete resource types on top of the sync and task engines:
//!
//! - cloud regions and per-provider capabilities
//! - NAT SKUs, reconciled per region from the provider SKU metadata
//! - common alerts, deleted together with their records through a task
//! - [`ControlPlane`], which assembles the tables, engines and task registry
//!   from a [`ControlPlaneConfig`](cloudplane_config::ControlPlaneConfig)

pub mod alert;
pub mod control_plane;
pub mod error;
pub mod meta;
pub mod nat_sku;
pub mod nat_sync;
pub mod region;
pub mod sync_task;

pub use alert::{AlertRecord, AlertTable, CommonAlert, DELETE_ALERT_TASK};
pub use control_plane::ControlPlane;
pub use error::{ComputeError, Result};
pub use meta::SkuResourcesMeta;
pub use nat_sku::{CloudNatSku, NatSku, NatSkuTable, RegionNatSkus};
pub use nat_sync::{MetaSource, NAT_SKU_RESOURCE, NatSkuSync, sync_nat_skus};
pub use region::{Cloudregion, ProviderCapabilities, RegionTable, provider_capabilities};
pub use sync_task::{SYNC_SKUS_TASK, SyncSkusParams, SyncSkusStage, SyncSkusTask};
