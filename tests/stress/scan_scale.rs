//! Stress test: reclaim scans over large paged allow-lists.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use jit_access::grant::encode;
use jit_access::{FirewallRule, GrantReclaimer, ManualClock, MemoryStore, Nonce, Subject, Ticks};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

fn rule(name: String, i: u32) -> FirewallRule {
    let ip = format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff);
    FirewallRule::new(name, Subject::parse(&ip).unwrap())
}

#[tokio::test]
async fn stress_10000_rules_half_expired() {
    let store = Arc::new(MemoryStore::with_page_size(250));
    let past = Ticks::from_datetime(t0() - Duration::minutes(1)).unwrap();
    let future = Ticks::from_datetime(t0() + Duration::minutes(1)).unwrap();

    for i in 0..10_000u32 {
        let deadline = if i % 2 == 0 { past } else { future };
        let nonce = Nonce::parse(&format!("{i:012x}")).unwrap();
        store.insert(rule(encode(&nonce, deadline), i));
    }

    let reclaimer = GrantReclaimer::new(store.clone()).with_clock(Arc::new(ManualClock::new(t0())));
    let report = reclaimer.run_scan().await.expect("scan should succeed");

    assert_eq!(report.scanned, 10_000);
    assert_eq!(report.expired_deleted, 5_000);
    assert_eq!(report.active_remaining, 5_000);
    assert_eq!(store.len(), 5_000);
    // Forty full pages plus the empty page that ends the listing.
    assert_eq!(store.counters().list_pages(), 41);
}

#[tokio::test]
async fn stress_mostly_foreign_allow_list() {
    let store = Arc::new(MemoryStore::with_page_size(100));
    let past = Ticks::from_datetime(t0() - Duration::days(30)).unwrap();

    for i in 0..5_000u32 {
        store.insert(rule(format!("office-{i:05}"), i));
    }
    for i in 0..50u32 {
        let nonce = Nonce::parse(&format!("{i:08x}")).unwrap();
        store.insert(rule(encode(&nonce, past), i));
    }
    for i in 0..50u32 {
        store.insert(rule(format!("JIT_{i:08x}_notanumber"), i));
    }

    let reclaimer = GrantReclaimer::new(store.clone()).with_clock(Arc::new(ManualClock::new(t0())));
    let report = reclaimer.run_scan().await.unwrap();

    assert_eq!(report.scanned, 5_100);
    assert_eq!(report.skipped_foreign, 5_000);
    assert_eq!(report.skipped_malformed, 50);
    assert_eq!(report.expired_deleted, 50);
    assert_eq!(store.counters().deletes(), 50);
    assert_eq!(store.len(), 5_050);
}

#[tokio::test]
async fn stress_repeated_scans_converge() {
    let store = Arc::new(MemoryStore::with_page_size(64));
    let clock = Arc::new(ManualClock::new(t0()));

    // Deadlines spread one minute apart over ten hours.
    for i in 0..600u32 {
        let deadline = Ticks::from_datetime(t0() + Duration::minutes(i as i64)).unwrap();
        let nonce = Nonce::parse(&format!("{i:08x}")).unwrap();
        store.insert(rule(encode(&nonce, deadline), i));
    }

    let reclaimer = GrantReclaimer::new(store.clone()).with_clock(clock.clone());
    let mut total = 0;
    for hour in 1..=10 {
        clock.set(t0() + Duration::hours(hour) + Duration::seconds(1));
        let report = reclaimer.run_scan().await.unwrap();
        assert!(report.is_clean());
        total += report.expired_deleted;
        assert_eq!(store.len(), 600 - total, "after hour {hour}");
    }
    assert_eq!(total, 600);
}
