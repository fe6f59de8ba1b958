//! Capabilities a resource type provides to the reconciliation engine
//!
//! A resource type becomes reconcilable by implementing these traits, usually
//! split between a provider-facing source ([`ExternalFetcher`]) and a
//! region-bound table ([`LocalStore`]). All local calls run while the pass
//! holds the scope's key lock.

use crate::error::Result;
use crate::model::{Actor, Externalized, SyncScope};
use async_trait::async_trait;
use std::sync::Arc;

/// Reads what the cloud provider currently reports for a scope
#[async_trait]
pub trait ExternalFetcher: Send + Sync {
    type Observation: Externalized + Send + 'static;

    async fn fetch_external(&self, scope: &SyncScope) -> Result<Vec<Self::Observation>>;
}

/// Reads the locally persisted records of a scope
#[async_trait]
pub trait LocalFetcher: Send + Sync {
    type Record: Externalized + Send + 'static;

    async fn fetch_local(&self, scope: &SyncScope) -> Result<Vec<Self::Record>>;
}

/// Removes a local record whose external object is gone
#[async_trait]
pub trait ApplyDelete: LocalFetcher {
    async fn apply_delete(&self, actor: &Actor, record: Self::Record) -> Result<()>;
}

/// Refreshes a local record from its external observation.
///
/// Implementations overwrite externally sourced fields only; local identity and
/// creation metadata are left alone.
#[async_trait]
pub trait ApplyUpdate<O: Send + 'static>: LocalFetcher {
    async fn apply_update(&self, actor: &Actor, local: Self::Record, external: O) -> Result<()>;
}

/// Persists a newly observed external object.
///
/// Implementations assign a fresh local identity and mark the record available.
#[async_trait]
pub trait ApplyInsert<O: Send + 'static>: Send + Sync {
    async fn apply_insert(&self, actor: &Actor, external: O) -> Result<()>;
}

/// Everything the engine needs from local persistence for observations `O`
pub trait LocalStore<O: Send + 'static>: ApplyDelete + ApplyUpdate<O> + ApplyInsert<O> {}

impl<T, O> LocalStore<O> for T
where
    O: Send + 'static,
    T: ApplyDelete + ApplyUpdate<O> + ApplyInsert<O>,
{
}

#[async_trait]
impl<T: ExternalFetcher + ?Sized> ExternalFetcher for Arc<T> {
    type Observation = T::Observation;

    async fn fetch_external(&self, scope: &SyncScope) -> Result<Vec<Self::Observation>> {
        (**self).fetch_external(scope).await
    }
}

#[async_trait]
impl<T: LocalFetcher + ?Sized> LocalFetcher for Arc<T> {
    type Record = T::Record;

    async fn fetch_local(&self, scope: &SyncScope) -> Result<Vec<Self::Record>> {
        (**self).fetch_local(scope).await
    }
}

#[async_trait]
impl<T: ApplyDelete + ?Sized> ApplyDelete for Arc<T> {
    async fn apply_delete(&self, actor: &Actor, record: Self::Record) -> Result<()> {
        (**self).apply_delete(actor, record).await
    }
}

#[async_trait]
impl<O: Send + 'static, T: ApplyUpdate<O> + ?Sized> ApplyUpdate<O> for Arc<T> {
    async fn apply_update(&self, actor: &Actor, local: Self::Record, external: O) -> Result<()> {
        (**self).apply_update(actor, local, external).await
    }
}

#[async_trait]
impl<O: Send + 'static, T: ApplyInsert<O> + ?Sized> ApplyInsert<O> for Arc<T> {
    async fn apply_insert(&self, actor: &Actor, external: O) -> Result<()> {
        (**self).apply_insert(actor, external).await
    }
}
