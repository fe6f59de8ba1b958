mod common;

use async_trait::async_trait;
use cloudplane_sync::{
    Actor, CancellationToken, KeyLock, PassOptions, Reconciler, Region, RegionOutcome,
    RegionalResource, Result, SyncAllOptions, SyncScheduler,
};
use common::{FakeProvider, FakeStore, Obs};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

struct SkuResource {
    regions: Vec<Region>,
    provider: Arc<FakeProvider>,
    stores: HashMap<String, Arc<FakeStore>>,
    unsupported: HashSet<String>,
}

impl SkuResource {
    fn new(provider: FakeProvider) -> Self {
        Self {
            regions: Vec::new(),
            provider: Arc::new(provider),
            stores: HashMap::new(),
            unsupported: HashSet::new(),
        }
    }

    fn region(mut self, id: &str, store: FakeStore) -> Self {
        self.regions
            .push(Region::new(id, format!("name-{}", id), format!("ext-{}", id), "fake"));
        self.stores.insert(id.to_string(), Arc::new(store));
        self
    }

    fn unsupported(mut self, id: &str) -> Self {
        self.unsupported.insert(id.to_string());
        self
    }

    fn store(&self, id: &str) -> &FakeStore {
        &self.stores[id]
    }
}

#[async_trait]
impl RegionalResource for SkuResource {
    type Source = Arc<FakeProvider>;
    type Store = Arc<FakeStore>;

    fn resource_type(&self) -> &str {
        "nat_sku"
    }

    async fn list_regions(&self, region_id: Option<&str>) -> Result<Vec<Region>> {
        Ok(self
            .regions
            .iter()
            .filter(|r| region_id.is_none_or(|id| r.id == id))
            .cloned()
            .collect())
    }

    fn is_supported(&self, region: &Region) -> bool {
        !self.unsupported.contains(&region.id)
    }

    async fn count_local(&self, region_id: Option<&str>) -> Result<usize> {
        Ok(self
            .stores
            .iter()
            .filter(|(id, _)| region_id.is_none_or(|r| r == id.as_str()))
            .map(|(_, store)| store.rows().len())
            .sum())
    }

    async fn external_source(&self) -> Result<Arc<FakeProvider>> {
        Ok(Arc::clone(&self.provider))
    }

    fn local_store(&self, region: &Region) -> Arc<FakeStore> {
        Arc::clone(&self.stores[&region.id])
    }
}

fn provider() -> FakeProvider {
    FakeProvider::new(vec![Obs::new("sku-small", "v"), Obs::new("sku-large", "v")])
}

#[tokio::test]
async fn test_sync_all_skips_unsupported_regions() {
    let resource = SkuResource::new(provider())
        .region("r1", FakeStore::default())
        .region("r2", FakeStore::default())
        .unsupported("r2");

    let report = Reconciler::default()
        .sync_all(&resource, &Actor::system(), &SyncAllOptions::new())
        .await
        .unwrap();

    assert_eq!(report.regions.len(), 2);
    assert!(matches!(report.regions[1].outcome, RegionOutcome::Unsupported));
    assert_eq!(report.synced_regions(), 1);
    assert_eq!(report.totals(), (2, 0, 0));
    assert_eq!(resource.store("r1").rows().len(), 2);
    assert!(resource.store("r2").calls().is_empty());
}

#[tokio::test]
async fn test_failing_region_does_not_stop_sweep() {
    let broken = FakeStore {
        fail_fetch: true,
        ..Default::default()
    };
    let resource = SkuResource::new(provider())
        .region("r1", broken)
        .region("r2", FakeStore::default());

    let report = Reconciler::default()
        .sync_all(&resource, &Actor::system(), &SyncAllOptions::new())
        .await
        .unwrap();

    let failed = report.failed_regions();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].region.id, "r1");
    assert_eq!(resource.store("r2").rows().len(), 2);
    assert!(report.regions[1].to_string().contains("added 2 success 0 fail"));
}

#[tokio::test]
async fn test_only_if_empty_skips_populated_tables() {
    let resource = SkuResource::new(provider())
        .region("r1", FakeStore::with_rows(&[("A", "sku-small")]))
        .region("r2", FakeStore::default());

    let options = SyncAllOptions::new().only_if_empty(true);
    let report = Reconciler::default()
        .sync_all(&resource, &Actor::system(), &options)
        .await
        .unwrap();

    assert!(report.skipped_existing);
    assert!(report.regions.is_empty());
    assert!(resource.store("r2").rows().is_empty());

    // the guard is per region filter
    let options = SyncAllOptions::new().region("r2").only_if_empty(true);
    let report = Reconciler::default()
        .sync_all(&resource, &Actor::system(), &options)
        .await
        .unwrap();
    assert!(!report.skipped_existing);
    assert_eq!(report.regions.len(), 1);
    assert_eq!(resource.store("r2").rows().len(), 2);
}

#[tokio::test]
async fn test_sweep_stops_when_cancelled() {
    let resource = SkuResource::new(provider())
        .region("r1", FakeStore::default())
        .region("r2", FakeStore::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let options = SyncAllOptions::new().pass(PassOptions::new().with_cancel(cancel));
    let report = Reconciler::default()
        .sync_all(&resource, &Actor::system(), &options)
        .await
        .unwrap();

    assert!(report.regions.is_empty());
    assert!(resource.store("r1").calls().is_empty());
}

#[tokio::test]
async fn test_scheduler_run_once_applies_guard_on_first_run_only() {
    let resource = Arc::new(
        SkuResource::new(provider())
            .region("r1", FakeStore::with_rows(&[("A", "sku-small")])),
    );
    let scheduler = SyncScheduler::new(
        Reconciler::new(KeyLock::default()),
        Duration::from_secs(3600),
    )
    .with_job(resource.clone())
    .only_if_empty_on_start(true);

    assert_eq!(scheduler.job_names(), vec!["nat_sku"]);

    let first = scheduler.run_once(true, None).await;
    assert_eq!(first.len(), 1);
    assert!(first[0].1.as_ref().unwrap().skipped_existing);
    assert_eq!(resource.store("r1").rows().len(), 1);

    let second = scheduler.run_once(false, None).await;
    let report = second[0].1.as_ref().unwrap();
    assert!(!report.skipped_existing);
    assert_eq!(report.totals(), (1, 1, 0));
    assert_eq!(resource.store("r1").rows().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_run_stops_on_cancel() {
    let resource = Arc::new(SkuResource::new(provider()).region("r1", FakeStore::default()));
    let scheduler = Arc::new(
        SyncScheduler::new(Reconciler::default(), Duration::from_secs(60))
            .with_job(resource.clone()),
    );
    let cancel = CancellationToken::new();

    let handle = {
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(90)).await;
    cancel.cancel();
    handle.await.unwrap();

    // first tick fires immediately, second at 60s
    let fetches = resource
        .store("r1")
        .calls()
        .iter()
        .filter(|c| *c == "fetch")
        .count();
    assert_eq!(fetches, 2);
}
