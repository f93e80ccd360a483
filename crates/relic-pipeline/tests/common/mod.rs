// crates/relic-pipeline/tests/common/mod.rs
//
// Shared fixtures for pipeline integration tests: a small projected grid,
// synthetic scenes with a chosen NDVI, scripted imagery sources, and a
// collecting alert sink.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use geo::polygon;
use ndarray::Array2;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use relic_core::traits::{AlertSink, ImagerySource};
use relic_core::{
    AreaOfInterest, Band, ChangeEvent, DateRange, GridSpec, IndexKind, MonitoringConfig, NewSite,
    QualityFlag, RelicError, Scene,
};

pub const CRS: &str = "EPSG:32635";
pub const SIZE: usize = 4;

/// Monthly NDVI values for a stable vegetated site.
pub const STABLE_NDVI: [f64; 12] = [
    0.60, 0.61, 0.59, 0.62, 0.60, 0.58, 0.61, 0.60, 0.59, 0.62, 0.60, 0.61,
];

pub fn grid() -> GridSpec {
    GridSpec {
        rows: SIZE,
        cols: SIZE,
        origin_x: 500_000.0,
        origin_y: 5_100_040.0,
        pixel_width: 10.0,
        pixel_height: 10.0,
        crs: CRS.to_string(),
    }
}

/// A site covering the whole test grid, monitoring NDVI only.
pub fn new_site(name: &str) -> NewSite {
    let indices = [IndexKind::Ndvi].into_iter().collect();
    NewSite {
        name: name.to_string(),
        geometry: polygon![
            (x: 500_000.0, y: 5_100_000.0),
            (x: 500_040.0, y: 5_100_000.0),
            (x: 500_040.0, y: 5_100_040.0),
            (x: 500_000.0, y: 5_100_040.0),
            (x: 500_000.0, y: 5_100_000.0),
        ],
        crs: CRS.to_string(),
        config: MonitoringConfig {
            indices,
            ..MonitoringConfig::default()
        },
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 31, 12, 0, 0).unwrap()
}

/// Tick time for month `m` (30-day steps from `t0`).
pub fn tick(m: i64) -> DateTime<Utc> {
    t0() + Duration::days(30 * m)
}

/// A clear scene whose NDVI is `ndvi` everywhere, acquired five days
/// before tick `m`.
pub fn ndvi_scene(site_id: Uuid, m: i64, ndvi: f64) -> Scene {
    let red = 0.1;
    let nir = red * (1.0 + ndvi) / (1.0 - ndvi);
    let mut bands = BTreeMap::new();
    bands.insert(Band::B4, Array2::from_elem((SIZE, SIZE), red));
    bands.insert(Band::B8, Array2::from_elem((SIZE, SIZE), nir));
    bands.insert(Band::B11, Array2::from_elem((SIZE, SIZE), 0.2));
    Scene {
        id: Uuid::now_v7(),
        site_id,
        acquired_at: tick(m) - Duration::days(5),
        grid: grid(),
        bands,
        quality: Array2::from_elem((SIZE, SIZE), QualityFlag::Valid),
        cloud_cover_pct: 5.0,
    }
}

/// Imagery source over a fixed scene list, filtered by site and window.
#[derive(Default)]
pub struct ScriptedSource {
    scenes: Mutex<Vec<Scene>>,
    calls: AtomicUsize,
    /// Cancelled from inside `fetch` when set.
    cancel_on_fetch: Mutex<Option<CancellationToken>>,
}

impl ScriptedSource {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            scenes: Mutex::new(scenes),
            ..Self::default()
        }
    }

    pub fn push(&self, scene: Scene) {
        self.scenes.lock().unwrap().push(scene);
    }

    pub fn cancel_on_fetch(&self, token: CancellationToken) {
        *self.cancel_on_fetch.lock().unwrap() = Some(token);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImagerySource for ScriptedSource {
    async fn fetch(&self, area: &AreaOfInterest, range: DateRange) -> Result<Vec<Scene>, RelicError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.cancel_on_fetch.lock().unwrap().as_ref() {
            token.cancel();
        }
        Ok(self
            .scenes
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.site_id == area.site_id && range.contains(s.acquired_at))
            .cloned()
            .collect())
    }
}

/// Source that always fails.
pub struct FailingSource;

#[async_trait]
impl ImagerySource for FailingSource {
    async fn fetch(&self, _area: &AreaOfInterest, _range: DateRange) -> Result<Vec<Scene>, RelicError> {
        Err(RelicError::Imagery("catalogue unreachable".to_string()))
    }
}

/// Alert sink that keeps everything it receives.
#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<ChangeEvent>>,
}

#[async_trait]
impl AlertSink for CollectingSink {
    async fn emit(&self, event: ChangeEvent) -> Result<(), RelicError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
