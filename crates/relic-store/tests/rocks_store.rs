// crates/relic-store/tests/rocks_store.rs
//
// Integration tests for the RocksDB store: key layout ordering, atomic
// evaluation commits, append-only events, composite supersession, and
// bit-exact baseline persistence across reopen.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use relic_core::traits::{
    BaselineStore, CompositeArchive, EventLog, ObservationLog, SiteStore, TickLedger,
};
use relic_core::{
    Band, Baseline, BaselineState, ChangeEvent, CompositeSummary, CustomFormula, CustomIndex,
    DateRange, Direction, Disposition, ErrorKind, IndexKind, MonitoringConfig, ObservationRecord, RelicError, Severity, SkipReason,
    TickOutcome, TickRecord,
};
use relic_store::{RocksStore, SiteRegistry};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a temporary directory path using UUID to avoid conflicts.
fn temp_db_path(label: &str) -> String {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("relic_test_{}_{}", label, Uuid::now_v7()));
    path.to_string_lossy().to_string()
}

fn month(m: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 15, 10, 0, 0).unwrap() + Duration::days(30 * m)
}

fn observation(site_id: Uuid, index: IndexKind, at: DateTime<Utc>, value: f64) -> ObservationRecord {
    ObservationRecord {
        id: Uuid::now_v7(),
        site_id,
        index,
        observed_at: at,
        value,
        valid_fraction: 0.95,
        composite_id: Uuid::now_v7(),
        disposition: Disposition::Absorbed,
    }
}

fn event(site_id: Uuid, at: DateTime<Utc>) -> ChangeEvent {
    ChangeEvent {
        id: Uuid::now_v7(),
        site_id,
        index: IndexKind::Ndvi,
        observed_at: at,
        emitted_at: Utc::now(),
        value: 0.3,
        baseline_mean: 0.6,
        baseline_std: 0.012,
        z_score: -25.0,
        affected_fraction: 0.8,
        severity: Severity::Severe,
        direction: Direction::Decrease,
        composite_id: Uuid::now_v7(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_baseline_survives_reopen_bit_exact() {
    let path = temp_db_path("baseline_reopen");
    let site = Uuid::now_v7();
    let mut b = Baseline::new(site, IndexKind::Ndvi);
    b.state = BaselineState::Established;
    b.mean = 0.6016666666666667;
    b.variance = 1.4722222222222213e-4;
    b.m2 = 1.7666666666666656e-3;
    b.sample_count = 12;
    b.weight = 11.2750988;
    b.last_observation_at = Some(month(11));

    {
        let store = RocksStore::open(&path).unwrap();
        store.save_baseline(&b).await.unwrap();
    }

    let store = RocksStore::open(&path).unwrap();
    let loaded = store
        .get_baseline(&site, &IndexKind::Ndvi)
        .await
        .unwrap()
        .expect("baseline should persist");
    assert_eq!(loaded.mean.to_bits(), b.mean.to_bits());
    assert_eq!(loaded.variance.to_bits(), b.variance.to_bits());
    assert_eq!(loaded.sample_count, b.sample_count);
    assert_eq!(loaded, b);
}

#[tokio::test]
async fn test_observations_are_listed_in_time_order_per_index() {
    let store = RocksStore::open(&temp_db_path("obs_order")).unwrap();
    let site = Uuid::now_v7();
    let b = Baseline::new(site, IndexKind::Ndvi);

    for m in [3, 1, 2] {
        store
            .commit_evaluation(&b, &observation(site, IndexKind::Ndvi, month(m), m as f64), None)
            .await
            .unwrap();
    }
    store
        .commit_evaluation(
            &Baseline::new(site, IndexKind::Ndbi),
            &observation(site, IndexKind::Ndbi, month(0), -0.1),
            None,
        )
        .await
        .unwrap();

    let ndvi = store.list_observations(&site, &IndexKind::Ndvi).await.unwrap();
    let values: Vec<f64> = ndvi.iter().map(|o| o.value).collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0]);
    assert_eq!(store.list_baselines(&site).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_duplicate_event_rejects_whole_commit() {
    let store = RocksStore::open(&temp_db_path("dup_event")).unwrap();
    let site = Uuid::now_v7();
    let e = event(site, month(12));
    store.append_event(&e).await.unwrap();
    assert!(store.append_event(&e).await.is_err(), "events are append-only");

    let mut b = Baseline::new(site, IndexKind::Ndvi);
    b.sample_count = 99;
    let err = store
        .commit_evaluation(&b, &observation(site, IndexKind::Ndvi, month(12), 0.3), Some(&e))
        .await
        .unwrap_err();
    assert!(matches!(err, RelicError::Validation(_)));
    assert!(store.get_baseline(&site, &IndexKind::Ndvi).await.unwrap().is_none());
    assert!(store
        .list_observations(&site, &IndexKind::Ndvi)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(store.list_events(&site).await.unwrap(), vec![e]);
}

#[tokio::test]
async fn test_superseded_composites_are_retained() {
    let store = RocksStore::open(&temp_db_path("composites")).unwrap();
    let site = Uuid::now_v7();
    let window = DateRange::ending_at(month(5), 30);
    let first = CompositeSummary {
        id: Uuid::now_v7(),
        site_id: site,
        window,
        observed_at: month(5) - Duration::days(3),
        aoi_pixels: 100,
        valid_fraction: 0.85,
        scene_ids: vec![Uuid::now_v7()],
        fingerprint: "aa".to_string(),
        created_at: Utc::now(),
        supersedes: None,
    };
    let second = CompositeSummary {
        id: Uuid::now_v7(),
        fingerprint: "bb".to_string(),
        supersedes: Some(first.id),
        ..first.clone()
    };
    store.archive_composite(&first).await.unwrap();
    store.archive_composite(&second).await.unwrap();

    let latest = store.latest_composite(&site, &window).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(latest.supersedes, Some(first.id));
    assert_eq!(store.list_composites(&site).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_tick_ledger_newest_first() {
    let store = RocksStore::open(&temp_db_path("ticks")).unwrap();
    let site = Uuid::now_v7();
    for m in 0..5 {
        store
            .record_tick(&TickRecord {
                site_id: site,
                index: IndexKind::Ndvi,
                tick_at: month(m),
                finished_at: month(m) + Duration::seconds(2),
                outcome: if m == 4 {
                    TickOutcome::Failed {
                        kind: ErrorKind::Imagery,
                        message: "timeout".to_string(),
                    }
                } else {
                    TickOutcome::Skipped {
                        reason: SkipReason::InsufficientData,
                    }
                },
            })
            .await
            .unwrap();
    }
    let ticks = store.list_ticks(&site, 3).await.unwrap();
    assert_eq!(ticks.len(), 3);
    assert_eq!(ticks[0].tick_at, month(4));
    assert_eq!(ticks[0].outcome.label(), "failed");
}

#[tokio::test]
async fn test_registry_over_rocks_tracks_active_index() {
    let store = Arc::new(RocksStore::open(&temp_db_path("registry")).unwrap());
    let registry = SiteRegistry::new(store.clone());

    let a = registry
        .create_from_preset("acropolis", MonitoringConfig::default())
        .await
        .unwrap();
    let b = registry
        .create_from_preset("taj_mahal", MonitoringConfig::default())
        .await
        .unwrap();
    registry.deactivate(&a.id).await.unwrap();

    let active = store.list_active_sites().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, b.id);
    assert_eq!(store.list_sites().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_redefined_custom_index_starts_a_new_lineage() {
    let store = RocksStore::open(&temp_db_path("custom_redefined")).unwrap();
    let site = Uuid::now_v7();
    let old = IndexKind::Custom(CustomIndex {
        name: "veg".to_string(),
        formula: CustomFormula::NormalizedDiff,
        band_a: Band::B8,
        band_b: Band::B4,
    });
    let new = IndexKind::Custom(CustomIndex {
        name: "veg".to_string(),
        formula: CustomFormula::Difference,
        band_a: Band::B8,
        band_b: Band::B4,
    });

    let mut b = Baseline::new(site, old.clone());
    b.sample_count = 1;
    store
        .commit_evaluation(&b, &observation(site, old.clone(), month(0), 0.6), None)
        .await
        .unwrap();

    // Nothing stored under the old definition leaks into the new one.
    assert!(store.get_baseline(&site, &new).await.unwrap().is_none());
    assert!(store.list_observations(&site, &new).await.unwrap().is_empty());

    let kept = store.get_baseline(&site, &old).await.unwrap().unwrap();
    assert_eq!(kept.index, old);
    let log = store.list_observations(&site, &old).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].index, old);
}
