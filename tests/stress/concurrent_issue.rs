//! Stress test: many concurrent grant requests against one store, with
//! reclaim scans running alongside.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};

use jit_access::grant::decode;
use jit_access::{
    AccessPolicy, AllowListStore, FileStore, GrantIssuer, GrantReclaimer, ManualClock,
    MemoryStore, Subject, TargetResource,
};

fn target() -> TargetResource {
    TargetResource::new("sub-0001", "rg-data", "sql-prod")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_500_concurrent_requests_unique_rules() {
    let store = Arc::new(MemoryStore::new());
    let issuer = Arc::new(GrantIssuer::new(
        store.clone(),
        target(),
        AccessPolicy::default(),
    ));
    let names = Arc::new(Mutex::new(Vec::with_capacity(500)));

    let mut handles = Vec::new();
    for i in 0..500u32 {
        let issuer = issuer.clone();
        let names = names.clone();
        handles.push(tokio::spawn(async move {
            let ip = format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256);
            let grant = issuer
                .request_access(Subject::parse(&ip).unwrap())
                .await
                .expect("request should succeed");
            names.lock().unwrap().push(grant.rule);
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked");
    }

    let names = names.lock().unwrap();
    let unique: HashSet<_> = names.iter().collect();
    assert_eq!(unique.len(), 500, "every request must produce its own rule");
    assert_eq!(store.len(), 500);
    assert!(names.iter().all(|n| decode(n).is_managed()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_scans_during_issuing_never_touch_live_grants() {
    let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(t0));
    let store = Arc::new(MemoryStore::with_page_size(7));
    let issuer = Arc::new(
        GrantIssuer::new(store.clone(), target(), AccessPolicy::default())
            .with_clock(clock.clone()),
    );
    let reclaimer = Arc::new(GrantReclaimer::new(store.clone()).with_clock(clock.clone()));

    let issuing = {
        let issuer = issuer.clone();
        tokio::spawn(async move {
            for i in 0..200u32 {
                let ip = format!("203.0.113.{}", i % 250);
                issuer
                    .request_access(Subject::parse(&ip).unwrap())
                    .await
                    .expect("request should succeed");
            }
        })
    };

    let scanning = {
        let reclaimer = reclaimer.clone();
        tokio::spawn(async move {
            let mut deleted = 0;
            for _ in 0..20 {
                let report = reclaimer.run_scan().await.expect("scan should succeed");
                deleted += report.expired_deleted;
                tokio::task::yield_now().await;
            }
            deleted
        })
    };

    issuing.await.unwrap();
    let deleted = scanning.await.unwrap();
    assert_eq!(deleted, 0, "no grant is past its deadline yet");
    assert_eq!(store.len(), 200);

    clock.advance(Duration::hours(1) + Duration::seconds(1));
    let report = reclaimer.run_scan().await.unwrap();
    assert_eq!(report.expired_deleted, 200);
    assert!(store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_concurrent_file_store_creates() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path(), &target()).unwrap());
    let issuer = Arc::new(GrantIssuer::new(
        store.clone(),
        target(),
        AccessPolicy::default(),
    ));

    let mut handles = Vec::new();
    for i in 0..100u32 {
        let issuer = issuer.clone();
        handles.push(tokio::spawn(async move {
            issuer
                .request_access(Subject::parse(&format!("198.51.100.{}", i % 250)).unwrap())
                .await
                .map(|g| g.rule)
        }));
    }

    let mut names = HashSet::new();
    for handle in handles {
        let name = handle.await.unwrap().expect("create should succeed");
        assert!(names.insert(name), "duplicate rule name issued");
    }

    let listed = store.list_all().await.unwrap();
    assert_eq!(listed.len(), 100);
}
