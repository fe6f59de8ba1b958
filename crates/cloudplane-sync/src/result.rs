//! Outcome of a reconciliation pass

use crate::error::SyncError;
use std::fmt;

/// The bucket an error was recorded under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncBucket {
    /// Whole-pass failure: fetch, lock or cancellation. Nothing after it ran.
    Pass,
    Delete,
    Update,
    Add,
}

impl fmt::Display for SyncBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncBucket::Pass => write!(f, "pass"),
            SyncBucket::Delete => write!(f, "delete"),
            SyncBucket::Update => write!(f, "update"),
            SyncBucket::Add => write!(f, "add"),
        }
    }
}

/// One recorded failure
#[derive(Debug)]
pub struct ItemError {
    pub bucket: SyncBucket,
    pub error: SyncError,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.bucket, self.error)
    }
}

/// Counters and errors accumulated by one pass.
///
/// Counters only move forward; the engine running the pass is the only writer.
#[derive(Debug, Default)]
pub struct SyncResult {
    added: usize,
    add_failed: usize,
    updated: usize,
    update_failed: usize,
    deleted: usize,
    delete_failed: usize,
    errors: Vec<ItemError>,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn added(&self) -> usize {
        self.added
    }

    pub fn updated(&self) -> usize {
        self.updated
    }

    pub fn deleted(&self) -> usize {
        self.deleted
    }

    pub fn add_failed(&self) -> usize {
        self.add_failed
    }

    pub fn update_failed(&self) -> usize {
        self.update_failed
    }

    pub fn delete_failed(&self) -> usize {
        self.delete_failed
    }

    pub fn errors(&self) -> &[ItemError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ItemError> {
        self.errors
    }

    /// The pass-level failure, if the pass was aborted
    pub fn fatal(&self) -> Option<&SyncError> {
        self.errors
            .iter()
            .find(|e| e.bucket == SyncBucket::Pass)
            .map(|e| &e.error)
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.fatal().map(SyncError::is_cancelled).unwrap_or(false)
    }

    /// Whether any error, fatal or per-item, was recorded
    pub fn is_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.deleted == 0 && self.errors.is_empty()
    }

    pub(crate) fn error(&mut self, error: SyncError) {
        self.errors.push(ItemError {
            bucket: SyncBucket::Pass,
            error,
        });
    }

    pub(crate) fn add(&mut self) {
        self.added += 1;
    }

    pub(crate) fn add_error(&mut self, error: SyncError) {
        self.add_failed += 1;
        self.errors.push(ItemError {
            bucket: SyncBucket::Add,
            error,
        });
    }

    pub(crate) fn update(&mut self) {
        self.updated += 1;
    }

    pub(crate) fn update_error(&mut self, error: SyncError) {
        self.update_failed += 1;
        self.errors.push(ItemError {
            bucket: SyncBucket::Update,
            error,
        });
    }

    pub(crate) fn delete(&mut self) {
        self.deleted += 1;
    }

    pub(crate) fn delete_error(&mut self, error: SyncError) {
        self.delete_failed += 1;
        self.errors.push(ItemError {
            bucket: SyncBucket::Delete,
            error,
        });
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(fatal) = self.fatal() {
            write!(f, "sync failed: {}; ", fatal)?;
        }
        write!(
            f,
            "removed {} success {} fail, updated {} success {} fail, added {} success {} fail",
            self.deleted,
            self.delete_failed,
            self.updated,
            self.update_failed,
            self.added,
            self.add_failed
        )
    }
}
