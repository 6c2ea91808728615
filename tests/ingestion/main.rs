//! End-to-end ingestion tests: seed → cycle → ledger, and the scheduler's
//! fixed-interval, no-overlap behaviour.

mod stub_quotes;

use std::sync::Arc;
use std::time::Duration;

use stub_quotes::StubQuotes;
use tiger_tracker::catalog::ReferenceCatalog;
use tiger_tracker::engine::{IngestionCycle, Scheduler};
use tiger_tracker::storage::Ledger;
use tiger_tracker::types::{AssetSpec, CatalogError, CycleError};

const PRICES: &[(&str, f64)] = &[("BTC", 65_000.0), ("SOL", 150.25), ("ETH", 3_200.5)];

fn assets() -> Vec<AssetSpec> {
    vec![
        AssetSpec::new("BTC", "bitcoin"),
        AssetSpec::new("SOL", "solana"),
        AssetSpec::new("ETH", "ethereum"),
    ]
}

async fn ledger() -> Ledger {
    let ledger = Ledger::in_memory().await.unwrap();
    ledger.migrate().await.unwrap();
    ledger
}

fn cycle(source: StubQuotes, catalog: ReferenceCatalog, ledger: Ledger) -> IngestionCycle {
    IngestionCycle::new(
        Arc::new(source),
        catalog,
        ledger,
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_restart_reseeds_without_duplicates() {
    let ledger = ledger().await;

    // Two "process starts" against the same store.
    for _ in 0..2 {
        let catalog = ReferenceCatalog::new(ledger.clone(), "Bryan", assets());
        assert!(catalog.seed().await.is_complete());
    }

    assert_eq!(ledger.count_users().await.unwrap(), 1);
    assert_eq!(ledger.count_assets().await.unwrap(), 3);
}

#[tokio::test]
async fn test_cycle_records_one_snapshot() {
    let ledger = ledger().await;
    let catalog = ReferenceCatalog::new(ledger.clone(), "Bryan", assets());
    catalog.seed().await;
    let resolved = catalog.resolve_assets(&catalog.symbols()).await.unwrap();

    let report = cycle(StubQuotes::new(PRICES), catalog, ledger.clone())
        .run_once()
        .await
        .unwrap();

    let stored = ledger.observations().await.unwrap();
    assert_eq!(stored.len(), 3);
    for (asset, (symbol, price)) in resolved.iter().zip(PRICES) {
        assert_eq!(&asset.symbol, symbol);
        let obs = stored.iter().find(|o| o.asset_id == asset.id).unwrap();
        assert_eq!(obs.timestamp, report.timestamp);
        assert_eq!(obs.quantity, 1);
        assert!((obs.price_usd - price).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_cycle_before_seeding_fails() {
    let ledger = ledger().await;
    let catalog = ReferenceCatalog::new(ledger.clone(), "Bryan", assets());

    let err = cycle(StubQuotes::new(PRICES), catalog, ledger.clone())
        .run_once()
        .await
        .unwrap_err();

    assert!(matches!(err, CycleError::Resolution(CatalogError::NotFound(_))));
    assert_eq!(ledger.count_observations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_fetch_failure_then_recovery() {
    let ledger = ledger().await;
    let catalog = ReferenceCatalog::new(ledger.clone(), "Bryan", assets());
    catalog.seed().await;

    let source = StubQuotes::new(PRICES);
    let cycle = cycle(source.clone(), catalog, ledger.clone());

    source.set_error("connection reset");
    assert!(matches!(cycle.run_once().await, Err(CycleError::Fetch(_))));
    assert_eq!(ledger.count_observations().await.unwrap(), 0);

    source.clear_error();
    cycle.run_once().await.unwrap();
    assert_eq!(ledger.count_observations().await.unwrap(), 3);
}

#[tokio::test]
async fn test_scheduler_never_overlaps_slow_cycles() {
    let ledger = ledger().await;
    let catalog = ReferenceCatalog::new(ledger.clone(), "Bryan", assets());
    catalog.seed().await;

    // Each fetch takes longer than the interval.
    let source = StubQuotes::new(PRICES).with_delay(Duration::from_millis(60));
    let scheduler = Scheduler::new(
        cycle(source.clone(), catalog, ledger.clone()),
        Duration::from_millis(20),
    );

    let stats = scheduler
        .run(tokio::time::sleep(Duration::from_millis(400)))
        .await
        .unwrap();

    assert!(stats.cycles_run >= 2, "only {} cycles ran", stats.cycles_run);
    assert_eq!(source.max_in_flight(), 1);
    assert_eq!(source.calls() as u64, stats.cycles_run);
    assert_eq!(stats.cycles_failed, 0);
    assert_eq!(
        ledger.count_observations().await.unwrap() as u64,
        stats.cycles_run * 3
    );
}

#[tokio::test]
async fn test_scheduler_waits_interval_between_cycles() {
    let ledger = ledger().await;
    let catalog = ReferenceCatalog::new(ledger.clone(), "Bryan", assets());
    catalog.seed().await;

    let scheduler = Scheduler::new(
        cycle(StubQuotes::new(PRICES), catalog, ledger.clone()),
        Duration::from_millis(100),
    );
    scheduler
        .run(tokio::time::sleep(Duration::from_millis(250)))
        .await
        .unwrap();

    let observations = ledger.observations().await.unwrap();
    let mut stamps: Vec<_> = observations.iter().map(|o| o.timestamp).collect();
    stamps.dedup();
    assert!(stamps.len() >= 2);
    for pair in stamps.windows(2) {
        let gap = (pair[1] - pair[0]).num_milliseconds();
        assert!(gap >= 100, "cycles only {gap}ms apart");
    }
}
