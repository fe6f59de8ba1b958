//! Per-key mutual exclusion
//!
//! A [`KeyLock`] hands out at most one [`LockToken`] per (scope, key) pair at a
//! time. Different keys never block each other. Tokens release on drop, so a
//! pass that fails, panics or is cancelled still gives its key back.

use crate::error::{Result, SyncError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Default deadline for [`KeyLock::acquire`]
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

type LockTable = Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>;

/// A (scope, key) pair, e.g. ("nat_sku", region id)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub scope: String,
    pub key: String,
}

impl LockKey {
    pub fn new(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.key)
    }
}

/// Table of per-key locks. Cloning shares the table.
#[derive(Clone)]
pub struct KeyLock {
    table: LockTable,
    default_timeout: Option<Duration>,
}

impl Default for KeyLock {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyLock {
    pub fn new() -> Self {
        Self::with_timeout(Some(DEFAULT_LOCK_TIMEOUT))
    }

    /// `None` waits forever
    pub fn with_timeout(default_timeout: Option<Duration>) -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Acquire (scope, key) within the default deadline
    pub async fn acquire(&self, scope: &str, key: &str) -> Result<LockToken> {
        self.acquire_timeout(scope, key, self.default_timeout).await
    }

    /// Acquire (scope, key), waiting at most `timeout`.
    ///
    /// Not re-entrant: acquiring a key the caller already holds waits for the
    /// caller itself and ends in [`SyncError::LockTimeout`].
    pub async fn acquire_timeout(
        &self,
        scope: &str,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<LockToken> {
        let lock_key = LockKey::new(scope, key);
        let entry = self.entry(&lock_key);

        let guard = match timeout {
            Some(limit) => match tokio::time::timeout(limit, entry.lock_owned()).await {
                Ok(guard) => guard,
                Err(_) => {
                    evict_idle(&self.table, &lock_key);
                    tracing::warn!("Timed out after {:?} waiting for lock {}", limit, lock_key);
                    return Err(SyncError::LockTimeout {
                        key: lock_key.to_string(),
                        timeout: limit,
                    });
                }
            },
            None => entry.lock_owned().await,
        };

        tracing::debug!("Acquired lock {}", lock_key);
        Ok(LockToken {
            key: lock_key,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        })
    }

    /// Whether some token currently holds (scope, key)
    pub fn is_locked(&self, scope: &str, key: &str) -> bool {
        let table = lock_table(&self.table);
        table
            .get(&LockKey::new(scope, key))
            .map(|m| m.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of keys with a holder or a waiter
    pub fn active_keys(&self) -> usize {
        lock_table(&self.table).len()
    }

    fn entry(&self, key: &LockKey) -> Arc<AsyncMutex<()>> {
        let mut table = lock_table(&self.table);
        Arc::clone(table.entry(key.clone()).or_default())
    }
}

/// Held mutual exclusion over one (scope, key) pair
pub struct LockToken {
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
    table: LockTable,
}

impl LockToken {
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }

    /// Release the lock. A second call is a no-op and returns `false`.
    pub fn release(&mut self) -> bool {
        match self.guard.take() {
            Some(guard) => {
                drop(guard);
                evict_idle(&self.table, &self.key);
                tracing::debug!("Released lock {}", self.key);
                true
            }
            None => {
                tracing::warn!("Lock {} released twice", self.key);
                false
            }
        }
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        if self.guard.is_some() {
            self.release();
        }
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockToken")
            .field("key", &self.key)
            .field("held", &self.is_held())
            .finish()
    }
}

fn lock_table(
    table: &LockTable,
) -> std::sync::MutexGuard<'_, HashMap<LockKey, Arc<AsyncMutex<()>>>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// Drop the table entry when only the table references it.
fn evict_idle(table: &LockTable, key: &LockKey) {
    let mut table = lock_table(table);
    if table
        .get(key)
        .map(|m| Arc::strong_count(m) == 1)
        .unwrap_or(false)
    {
        table.remove(key);
    }
}
