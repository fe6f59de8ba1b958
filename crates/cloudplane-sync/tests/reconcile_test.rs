mod common;

use cloudplane_sync::{
    Actor, CancellationToken, FetchSide, KeyLock, PassOptions, Reconciler, Region, SyncBucket,
    SyncError, SyncScope,
};
use common::{FakeProvider, FakeStore, Obs};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn scope() -> SyncScope {
    let region = Region::new("region-1", "Beijing", "Aliyun/cn-beijing", "Aliyun");
    SyncScope::new("nat_sku", &region)
}

#[tokio::test]
async fn test_end_to_end_add_update_delete() {
    let reconciler = Reconciler::default();
    let store = FakeStore::with_rows(&[("A", "x1"), ("B", "x2")]);
    let provider = FakeProvider::new(vec![Obs::new("x1", "updated"), Obs::new("x3", "new")]);

    let result = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;

    assert_eq!(result.deleted(), 1);
    assert_eq!(result.updated(), 1);
    assert_eq!(result.added(), 1);
    assert!(result.errors().is_empty());

    let rows = store.rows();
    assert_eq!(rows.len(), 2);
    let a = rows.iter().find(|r| r.global_id == "x1").unwrap();
    assert_eq!(a.id, "A");
    assert_eq!(a.value, "updated");
    assert_eq!(a.created_seq, 0);
    let new = rows.iter().find(|r| r.global_id == "x3").unwrap();
    assert_ne!(new.id, "x3");
    assert_eq!(new.status, "available");
    assert!(!rows.iter().any(|r| r.id == "B"));
}

#[tokio::test]
async fn test_apply_order_is_delete_update_insert() {
    let reconciler = Reconciler::default();
    let store = FakeStore::with_rows(&[("A", "x1"), ("B", "x2"), ("C", "x4")]);
    let provider = FakeProvider::new(vec![
        Obs::new("x5", "v"),
        Obs::new("x4", "v"),
        Obs::new("x1", "v"),
    ]);

    reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;

    assert_eq!(
        store.calls(),
        vec!["fetch", "delete:x2", "update:x1", "update:x4", "insert:x5"]
    );
}

#[tokio::test]
async fn test_external_fetch_failure_aborts_pass() {
    let reconciler = Reconciler::default();
    let store = FakeStore::with_rows(&[("A", "x1")]);
    let provider = FakeProvider::failing();

    let result = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;

    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].bucket, SyncBucket::Pass);
    assert!(matches!(
        result.fatal(),
        Some(SyncError::Fetch {
            side: FetchSide::External,
            ..
        })
    ));
    // local side never touched, nothing applied
    assert!(store.calls().is_empty());
    assert_eq!(store.rows().len(), 1);
    assert!(!reconciler.locks().is_locked("nat_sku", "region-1"));
}

#[tokio::test]
async fn test_local_fetch_failure_aborts_pass() {
    let reconciler = Reconciler::default();
    let store = FakeStore {
        fail_fetch: true,
        ..Default::default()
    };
    let provider = FakeProvider::new(vec![Obs::new("x1", "v")]);

    let result = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;

    assert_eq!(result.errors().len(), 1);
    assert!(matches!(
        result.fatal(),
        Some(SyncError::Fetch {
            side: FetchSide::Local,
            ..
        })
    ));
    assert_eq!(store.apply_calls(), 0);
    assert_eq!(result.added(), 0);
    assert!(!reconciler.locks().is_locked("nat_sku", "region-1"));
}

#[tokio::test]
async fn test_item_failures_are_isolated() {
    let reconciler = Reconciler::default();
    let mut store = FakeStore::with_rows(&[("A", "x1"), ("B", "x2"), ("C", "x3"), ("D", "x9")]);
    store.fail_update.insert("x2".to_string());
    store.fail_delete.insert("x9".to_string());
    store.fail_insert.insert("x7".to_string());
    let provider = FakeProvider::new(vec![
        Obs::new("x1", "v"),
        Obs::new("x2", "v"),
        Obs::new("x3", "v"),
        Obs::new("x7", "v"),
        Obs::new("x8", "v"),
    ]);

    let result = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;

    assert!(!result.is_fatal());
    assert_eq!(result.updated(), 2);
    assert_eq!(result.update_failed(), 1);
    assert_eq!(result.deleted(), 0);
    assert_eq!(result.delete_failed(), 1);
    assert_eq!(result.added(), 1);
    assert_eq!(result.add_failed(), 1);

    let buckets: Vec<_> = result.errors().iter().map(|e| e.bucket).collect();
    assert_eq!(
        buckets,
        vec![SyncBucket::Delete, SyncBucket::Update, SyncBucket::Add]
    );
}

#[tokio::test]
async fn test_second_pass_is_idempotent() {
    let reconciler = Reconciler::default();
    let store = FakeStore::with_rows(&[("A", "x1"), ("B", "x2")]);
    let provider = FakeProvider::new(vec![
        Obs::new("x1", "v"),
        Obs::new("x3", "v"),
        Obs::new("x4", "v"),
    ]);

    let first = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;
    assert_eq!((first.added(), first.updated(), first.deleted()), (2, 1, 1));

    let second = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;
    assert_eq!(second.added(), 0);
    assert_eq!(second.deleted(), 0);
    assert_eq!(second.updated(), 3);
    assert!(second.is_unchanged());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_passes_on_same_scope_do_not_overlap() {
    let reconciler = Reconciler::new(KeyLock::with_timeout(None));
    let store = Arc::new(FakeStore {
        apply_delay: Some(Duration::from_millis(3)),
        ..FakeStore::with_rows(&[("A", "x1"), ("B", "x2")])
    });
    let provider = Arc::new(FakeProvider::new(vec![
        Obs::new("x1", "v"),
        Obs::new("x2", "v"),
        Obs::new("x3", "v"),
    ]));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let reconciler = reconciler.clone();
        let store = Arc::clone(&store);
        let provider = Arc::clone(&provider);
        handles.push(tokio::spawn(async move {
            reconciler
                .reconcile(&scope(), &Actor::system(), provider.as_ref(), store.as_ref())
                .await
        }));
    }
    let results = futures_util::future::join_all(handles).await;

    assert_eq!(store.overlaps.load(Ordering::SeqCst), 0);
    let added: usize = results.iter().map(|r| r.as_ref().unwrap().added()).sum();
    assert_eq!(added, 1);
    assert_eq!(store.rows().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_lock_timeout_prevents_pass() {
    let locks = KeyLock::with_timeout(Some(Duration::from_secs(2)));
    let reconciler = Reconciler::new(locks.clone());
    let _held = locks.acquire("nat_sku", "region-1").await.unwrap();

    let store = FakeStore::with_rows(&[("A", "x1")]);
    let provider = FakeProvider::new(vec![]);
    let result = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;

    assert!(result.fatal().is_some_and(SyncError::is_lock_timeout));
    assert!(store.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_pass_keeps_partial_counts_and_releases_lock() {
    let reconciler = Reconciler::default();
    let store = Arc::new(FakeStore {
        apply_delay: Some(Duration::from_millis(20)),
        ..FakeStore::with_rows(&[("A", "x1"), ("B", "x2"), ("C", "x3")])
    });
    let provider = Arc::new(FakeProvider::new(vec![]));
    let cancel = CancellationToken::new();

    let handle = {
        let reconciler = reconciler.clone();
        let store = Arc::clone(&store);
        let provider = Arc::clone(&provider);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            reconciler
                .reconcile_cancellable(
                    &scope(),
                    &Actor::system(),
                    provider.as_ref(),
                    store.as_ref(),
                    &cancel,
                )
                .await
        })
    };

    // fetch and the first delete take 20ms each; cancel during the second delete
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    let result = handle.await.unwrap();

    assert!(result.is_cancelled());
    assert_eq!(result.deleted(), 1);
    assert_eq!(store.rows().len(), 2);
    assert!(!reconciler.locks().is_locked("nat_sku", "region-1"));
}

#[tokio::test(start_paused = true)]
async fn test_pass_deadline_interrupts_slow_fetch() {
    let reconciler = Reconciler::default();
    let store = FakeStore::with_rows(&[("A", "x1")]);
    let provider = FakeProvider {
        delay: Some(Duration::from_secs(60)),
        ..FakeProvider::new(vec![])
    };

    let options = PassOptions::new().with_timeout(Duration::from_secs(5));
    let result = reconciler
        .reconcile_with(&scope(), &Actor::system(), &provider, &store, &options)
        .await;

    assert!(result.is_cancelled());
    assert_eq!(store.apply_calls(), 0);
    assert!(!reconciler.locks().is_locked("nat_sku", "region-1"));
}

#[tokio::test(start_paused = true)]
async fn test_pass_deadline_interrupts_stalled_apply() {
    let reconciler = Reconciler::default();
    let store = FakeStore {
        delete_stall: Some(Duration::from_secs(600)),
        ..FakeStore::with_rows(&[("A", "x1"), ("B", "x2")])
    };
    let provider = FakeProvider::new(vec![]);

    let started = tokio::time::Instant::now();
    let options = PassOptions::new().with_timeout(Duration::from_secs(5));
    let result = reconciler
        .reconcile_with(&scope(), &Actor::system(), &provider, &store, &options)
        .await;

    assert!(started.elapsed() < Duration::from_secs(6));
    assert!(result.is_cancelled());
    assert_eq!(result.deleted(), 0);
    assert_eq!(store.rows().len(), 2);
    assert_eq!(store.apply_calls(), 1);
    assert!(!reconciler.locks().is_locked("nat_sku", "region-1"));
}

#[tokio::test]
async fn test_provider_changes_between_passes() {
    let reconciler = Reconciler::default();
    let store = FakeStore::default();
    let provider = FakeProvider::new(vec![Obs::new("x1", "v1"), Obs::new("x2", "v1")]);

    let first = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;
    assert_eq!(first.added(), 2);

    provider.set(vec![Obs::new("x2", "v2")]);
    let second = reconciler
        .reconcile(&scope(), &Actor::system(), &provider, &store)
        .await;
    assert_eq!((second.added(), second.updated(), second.deleted()), (0, 1, 1));
    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, "v2");
}
