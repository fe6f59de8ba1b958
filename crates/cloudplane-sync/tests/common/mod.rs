#![allow(dead_code)]

use async_trait::async_trait;
use cloudplane_sync::{
    Actor, ApplyDelete, ApplyInsert, ApplyUpdate, ExternalFetcher, Externalized, LocalFetcher,
    Result, SyncError, SyncScope,
};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub global_id: String,
    pub value: String,
    pub created_seq: usize,
    pub status: String,
}

impl Externalized for Row {
    fn global_id(&self) -> &str {
        &self.global_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Obs {
    pub global_id: String,
    pub value: String,
}

impl Obs {
    pub fn new(global_id: &str, value: &str) -> Self {
        Self {
            global_id: global_id.to_string(),
            value: value.to_string(),
        }
    }
}

impl Externalized for Obs {
    fn global_id(&self) -> &str {
        &self.global_id
    }
}

/// Provider stub returning a fixed observation list
#[derive(Default)]
pub struct FakeProvider {
    pub items: Mutex<Vec<Obs>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl FakeProvider {
    pub fn new(items: Vec<Obs>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn set(&self, items: Vec<Obs>) {
        *self.items.lock().unwrap() = items;
    }
}

#[async_trait]
impl ExternalFetcher for FakeProvider {
    type Observation = Obs;

    async fn fetch_external(&self, _scope: &SyncScope) -> Result<Vec<Obs>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SyncError::Provider("provider unavailable".to_string()));
        }
        Ok(self.items.lock().unwrap().clone())
    }
}

/// Instrumented in-memory table
#[derive(Default)]
pub struct FakeStore {
    pub rows: Mutex<Vec<Row>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_fetch: bool,
    pub fail_update: HashSet<String>,
    pub fail_insert: HashSet<String>,
    pub fail_delete: HashSet<String>,
    pub apply_delay: Option<Duration>,
    /// Extra wait inside every delete, after the call is recorded
    pub delete_stall: Option<Duration>,
    pub next_id: AtomicUsize,
    pub active: AtomicUsize,
    pub overlaps: AtomicUsize,
}

impl FakeStore {
    pub fn with_rows(rows: &[(&str, &str)]) -> Self {
        let store = Self::default();
        for (id, global_id) in rows {
            store.rows.lock().unwrap().push(Row {
                id: id.to_string(),
                global_id: global_id.to_string(),
                value: "old".to_string(),
                created_seq: store.next_id.fetch_add(1, Ordering::SeqCst),
                status: "available".to_string(),
            });
        }
        store
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn apply_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !c.starts_with("fetch"))
            .count()
    }

    async fn enter(&self, call: String) {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocalFetcher for FakeStore {
    type Record = Row;

    async fn fetch_local(&self, _scope: &SyncScope) -> Result<Vec<Row>> {
        self.enter("fetch".to_string()).await;
        self.leave();
        if self.fail_fetch {
            return Err(SyncError::Persistence("db down".to_string()));
        }
        Ok(self.rows())
    }
}

#[async_trait]
impl ApplyDelete for FakeStore {
    async fn apply_delete(&self, _actor: &Actor, record: Row) -> Result<()> {
        self.enter(format!("delete:{}", record.global_id)).await;
        self.leave();
        if let Some(stall) = self.delete_stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail_delete.contains(&record.global_id) {
            return Err(SyncError::Persistence(format!("delete {}", record.global_id)));
        }
        self.rows.lock().unwrap().retain(|r| r.id != record.id);
        Ok(())
    }
}

#[async_trait]
impl ApplyUpdate<Obs> for FakeStore {
    async fn apply_update(&self, _actor: &Actor, local: Row, external: Obs) -> Result<()> {
        self.enter(format!("update:{}", local.global_id)).await;
        self.leave();
        if self.fail_update.contains(&local.global_id) {
            return Err(SyncError::Persistence(format!("update {}", local.global_id)));
        }
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id == local.id) {
            row.value = external.value;
            row.status = "available".to_string();
        }
        Ok(())
    }
}

#[async_trait]
impl ApplyInsert<Obs> for FakeStore {
    async fn apply_insert(&self, _actor: &Actor, external: Obs) -> Result<()> {
        self.enter(format!("insert:{}", external.global_id)).await;
        self.leave();
        if self.fail_insert.contains(&external.global_id) {
            return Err(SyncError::Persistence(format!("insert {}", external.global_id)));
        }
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(Row {
            id: format!("local-{}", seq),
            global_id: external.global_id,
            value: external.value,
            created_seq: seq,
            status: "available".to_string(),
        });
        Ok(())
    }
}
