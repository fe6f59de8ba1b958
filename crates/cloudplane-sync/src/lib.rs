//! cloudplane reconciliation core
//!
//! This crate keeps locally persisted cloud resources in step with what each
//! provider reports, one (resource type, region) scope at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │          SyncScheduler / API / tasks             │
//! └─────────────────┬───────────────────────────────┘
//!                   │ sync_all / reconcile
//! ┌─────────────────▼───────────────────────────────┐
//! │                cloudplane-sync                   │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │   KeyLock    │  │  Reconciler              │ │
//! │  │ (scope, key) │  │  fetch → compare → apply │ │
//! │  └──────────────┘  └──────────────────────────┘ │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ExternalFetcher│ │  LocalStore   │
//! │  (provider)   │ │ (persistence) │
//! └───────────────┘ └───────────────┘
//! ```

pub mod capability;
pub mod compare;
pub mod driver;
pub mod error;
pub mod lock;
pub mod model;
pub mod reconcile;
pub mod result;
pub mod scheduler;

// Re-exports
pub use capability::{
    ApplyDelete, ApplyInsert, ApplyUpdate, ExternalFetcher, LocalFetcher, LocalStore,
};
pub use compare::{SetDiff, compare_sets};
pub use driver::{RegionOutcome, RegionReport, RegionalResource, SyncAllOptions, SyncReport};
pub use error::{FetchSide, Result, SyncError};
pub use lock::{DEFAULT_LOCK_TIMEOUT, KeyLock, LockKey, LockToken};
pub use model::{Actor, Externalized, Region, SyncScope};
pub use reconcile::{PassOptions, Reconciler};
pub use result::{ItemError, SyncBucket, SyncResult};
pub use scheduler::{SyncJob, SyncScheduler};
pub use tokio_util::sync::CancellationToken;
