//! The diff-sync reconciliation engine
//!
//! One pass, under the scope's key lock:
//!
//! 1. fetch the external set, then the local set (either failing aborts the pass)
//! 2. compare by global id
//! 3. delete removed records, update matched pairs, insert added observations,
//!    in that order, recording per-item failures without stopping
//!
//! Cancellation and deadlines are checked at the suspension points: lock
//! acquisition, both fetches, and between items.

use crate::capability::{ExternalFetcher, LocalStore};
use crate::compare::compare_sets;
use crate::error::{FetchSide, Result, SyncError};
use crate::lock::KeyLock;
use crate::model::{Actor, SyncScope};
use crate::result::SyncResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Interruption settings for a single pass
#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    pub cancel: Option<CancellationToken>,
    /// Overall deadline for the pass, lock wait included
    pub timeout: Option<Duration>,
    /// Overrides the lock table's default acquire deadline
    pub lock_timeout: Option<Duration>,
}

impl PassOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

/// Runs reconciliation passes against a shared key-lock table
#[derive(Clone, Default)]
pub struct Reconciler {
    locks: KeyLock,
}

impl Reconciler {
    pub fn new(locks: KeyLock) -> Self {
        Self { locks }
    }

    pub fn locks(&self) -> &KeyLock {
        &self.locks
    }

    /// Run one pass for `scope`
    pub async fn reconcile<X, L>(
        &self,
        scope: &SyncScope,
        actor: &Actor,
        external: &X,
        local: &L,
    ) -> SyncResult
    where
        X: ExternalFetcher + ?Sized,
        L: LocalStore<X::Observation> + ?Sized,
    {
        self.reconcile_with(scope, actor, external, local, &PassOptions::default())
            .await
    }

    /// Run one pass that stops early once `cancel` fires
    pub async fn reconcile_cancellable<X, L>(
        &self,
        scope: &SyncScope,
        actor: &Actor,
        external: &X,
        local: &L,
        cancel: &CancellationToken,
    ) -> SyncResult
    where
        X: ExternalFetcher + ?Sized,
        L: LocalStore<X::Observation> + ?Sized,
    {
        let options = PassOptions::new().with_cancel(cancel.clone());
        self.reconcile_with(scope, actor, external, local, &options)
            .await
    }

    /// Run one pass with explicit interruption settings.
    ///
    /// An interrupted pass keeps the counts it reached and records a
    /// [`SyncError::Cancelled`] pass error.
    pub async fn reconcile_with<X, L>(
        &self,
        scope: &SyncScope,
        actor: &Actor,
        external: &X,
        local: &L,
        options: &PassOptions,
    ) -> SyncResult
    where
        X: ExternalFetcher + ?Sized,
        L: LocalStore<X::Observation> + ?Sized,
    {
        let interrupt = Interrupt {
            cancel: options.cancel.as_ref(),
            deadline: options.timeout.map(|t| Instant::now() + t),
        };
        let mut result = SyncResult::new();

        let (namespace, key) = scope.lock_key();
        let lock_timeout = options.lock_timeout.or(self.locks.default_timeout());
        let acquired = interrupt
            .guard(self.locks.acquire_timeout(namespace, key, lock_timeout))
            .await;
        let mut token = match acquired {
            Ok(Ok(token)) => token,
            Ok(Err(e)) | Err(e) => {
                tracing::error!("Sync {} not started: {}", scope, e);
                result.error(e);
                return result;
            }
        };

        tracing::debug!("Sync {} started by {}", scope, actor);
        if let Err(e) = self
            .run_pass(scope, actor, external, local, &interrupt, &mut result)
            .await
        {
            tracing::warn!("Sync {} interrupted: {}", scope, e);
            result.error(e);
        }

        token.release();
        tracing::info!("Sync {} result: {}", scope, result);
        result
    }

    async fn run_pass<X, L>(
        &self,
        scope: &SyncScope,
        actor: &Actor,
        external: &X,
        local: &L,
        interrupt: &Interrupt<'_>,
        result: &mut SyncResult,
    ) -> Result<()>
    where
        X: ExternalFetcher + ?Sized,
        L: LocalStore<X::Observation> + ?Sized,
    {
        let observed = match interrupt.guard(external.fetch_external(scope)).await? {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("Sync {}: external fetch failed: {}", scope, e);
                result.error(SyncError::fetch(FetchSide::External, e));
                return Ok(());
            }
        };

        let records = match interrupt.guard(local.fetch_local(scope)).await? {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("Sync {}: local fetch failed: {}", scope, e);
                result.error(SyncError::fetch(FetchSide::Local, e));
                return Ok(());
            }
        };

        let diff = compare_sets(records, observed);
        tracing::debug!(
            "Sync {}: {} removed, {} matched, {} added",
            scope,
            diff.removed.len(),
            diff.matched_local.len(),
            diff.added.len()
        );
        let (removed, matched, added) = diff.into_pairs();

        for record in removed {
            match interrupt.guard(local.apply_delete(actor, record)).await? {
                Ok(()) => result.delete(),
                Err(e) => {
                    tracing::warn!("Sync {}: delete failed: {}", scope, e);
                    result.delete_error(e);
                }
            }
        }

        for (record, observation) in matched {
            match interrupt.guard(local.apply_update(actor, record, observation)).await? {
                Ok(()) => result.update(),
                Err(e) => {
                    tracing::warn!("Sync {}: update failed: {}", scope, e);
                    result.update_error(e);
                }
            }
        }

        for observation in added {
            match interrupt.guard(local.apply_insert(actor, observation)).await? {
                Ok(()) => result.add(),
                Err(e) => {
                    tracing::warn!("Sync {}: insert failed: {}", scope, e);
                    result.add_error(e);
                }
            }
        }

        Ok(())
    }
}

struct Interrupt<'a> {
    cancel: Option<&'a CancellationToken>,
    deadline: Option<Instant>,
}

impl Interrupt<'_> {
    fn check(&self) -> Result<()> {
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(SyncError::Cancelled("pass cancelled".to_string()));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SyncError::Cancelled("pass deadline exceeded".to_string()));
        }
        Ok(())
    }

    /// Await `fut` unless the pass is cancelled or runs out of time first
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        self.check()?;
        let cancelled = async {
            match self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancelled => Err(SyncError::Cancelled("pass cancelled".to_string())),
            _ = expired => Err(SyncError::Cancelled("pass deadline exceeded".to_string())),
            out = fut => Ok(out),
        }
    }
}
