//! Behaviour shared by every backend, run against both.

use std::sync::Arc;

use cg_domain::config::{LedgerBackend, QuotaConfig};
use cg_domain::usage::{UsageEvent, WindowTotals};
use cg_ledger::{open_store, InMemoryUsageStore, SqliteUsageStore, UsageStore};
use chrono::{Duration, SubsecRound, TimeZone, Utc};

async fn sqlite_store(dir: &tempfile::TempDir) -> Arc<dyn UsageStore> {
    Arc::new(
        SqliteUsageStore::open(dir.path().join("nested").join("usage.db"))
            .await
            .unwrap(),
    )
}

async fn backends(dir: &tempfile::TempDir) -> Vec<Arc<dyn UsageStore>> {
    vec![Arc::new(InMemoryUsageStore::new()), sqlite_store(dir).await]
}

#[tokio::test]
async fn window_totals_sum_successful_events_only() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let now = Utc::now();
        store.append(UsageEvent::new("alice", "m", 10, true, now)).await.unwrap();
        store.append(UsageEvent::new("alice", "m", 20, true, now)).await.unwrap();
        store.append(UsageEvent::new("alice", "m", 999, false, now)).await.unwrap();

        let totals = store
            .window_totals("alice", "m", now - Duration::seconds(60), now)
            .await
            .unwrap();
        assert_eq!(totals, WindowTotals { requests: 2, tokens: 30 });
    }
}

#[tokio::test]
async fn empty_window_is_zero() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let now = Utc::now();
        let totals = store
            .window_totals("nobody", "m", now - Duration::hours(24), now)
            .await
            .unwrap();
        assert_eq!(totals, WindowTotals::default());
    }
}

#[tokio::test]
async fn purge_removes_only_strictly_older_events() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let now = Utc::now().trunc_subsecs(6);
        let cutoff = now - Duration::days(30);
        store
            .append(UsageEvent::new("u", "m", 1, true, cutoff - Duration::seconds(1)))
            .await
            .unwrap();
        store.append(UsageEvent::new("u", "m", 2, true, cutoff)).await.unwrap();
        store.append(UsageEvent::new("u", "m", 4, true, now)).await.unwrap();

        assert_eq!(store.purge_before(cutoff).await.unwrap(), 1);
        // Idempotent.
        assert_eq!(store.purge_before(cutoff).await.unwrap(), 0);

        let totals = store
            .window_totals("u", "m", cutoff - Duration::days(1), now)
            .await
            .unwrap();
        assert_eq!(totals.tokens, 6);
    }
}

#[tokio::test]
async fn stats_include_failures_in_success_rate() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let now = Utc::now();
        for success in [true, true, true, false] {
            store
                .append(UsageEvent::new("u", "m", 10, success, now))
                .await
                .unwrap();
        }
        store.append(UsageEvent::new("u", "other", 5, true, now)).await.unwrap();

        let since = now - Duration::hours(1);
        let one_model = store.stats("u", Some("m"), since, now).await.unwrap();
        assert_eq!(one_model.total_requests, 4);
        assert_eq!(one_model.total_tokens, 40);
        assert!((one_model.success_rate - 75.0).abs() < 1e-9);

        let all_models = store.stats("u", None, since, now).await.unwrap();
        assert_eq!(all_models.total_requests, 5);
        assert!((all_models.success_rate - 80.0).abs() < 1e-9);

        let nobody = store.stats("nobody", None, since, now).await.unwrap();
        assert_eq!(nobody.total_requests, 0);
        assert_eq!(nobody.success_rate, 0.0);
    }
}

#[tokio::test]
async fn sqlite_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage.db");
    let now = Utc::now();
    {
        let store = SqliteUsageStore::open(path.clone()).await.unwrap();
        assert!(store.is_persistent());
        store.append(UsageEvent::new("u", "m", 7, true, now)).await.unwrap();
    }
    let store = SqliteUsageStore::open(path).await.unwrap();
    let totals = store
        .window_totals("u", "m", now - Duration::seconds(1), now)
        .await
        .unwrap();
    assert_eq!(totals, WindowTotals { requests: 1, tokens: 7 });
}

#[tokio::test]
async fn open_store_follows_config() {
    let dir = tempfile::tempdir().unwrap();
    let memory = open_store(&QuotaConfig {
        store: LedgerBackend::Memory,
        ..Default::default()
    })
    .await
    .unwrap();
    assert!(!memory.is_persistent());

    let sqlite = open_store(&QuotaConfig {
        store: LedgerBackend::Sqlite,
        sqlite_path: dir.path().join("cfg.db"),
        ..Default::default()
    })
    .await
    .unwrap();
    assert!(sqlite.is_persistent());
}

#[tokio::test]
async fn backends_agree_on_sub_millisecond_edges() {
    let dir = tempfile::tempdir().unwrap();
    let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let event_at = base + Duration::microseconds(10);

    for store in backends(&dir).await {
        // Stamped with extra nanoseconds; the ledger keeps whole microseconds.
        store
            .append(UsageEvent::new("u", "m", 3, true, event_at + Duration::nanoseconds(700)))
            .await
            .unwrap();

        let after = store
            .window_totals("u", "m", base + Duration::nanoseconds(10_500), base + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(after.requests, 0);

        let before = store
            .window_totals("u", "m", base, base + Duration::nanoseconds(9_500))
            .await
            .unwrap();
        assert_eq!(before.requests, 0);

        let exact = store.window_totals("u", "m", event_at, event_at).await.unwrap();
        assert_eq!(exact, WindowTotals { requests: 1, tokens: 3 });

        // Same millisecond as the event, but strictly later.
        assert_eq!(
            store.purge_before(base + Duration::nanoseconds(10_500)).await.unwrap(),
            1
        );
    }
}
