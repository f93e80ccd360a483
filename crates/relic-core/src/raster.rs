// crates/relic-core/src/raster.rs
//
// Derived rasters: per-window composites and the index rasters computed
// over them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::band::Band;
use crate::geometry::GridSpec;
use crate::index::IndexKind;
use crate::scene::DateRange;

/// Best-available-pixel mosaic of the scenes in one compositing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composite {
    pub id: Uuid,
    pub site_id: Uuid,
    pub window: DateRange,
    /// Acquisition time of the most recent contributing scene.
    pub observed_at: DateTime<Utc>,
    pub grid: GridSpec,
    pub bands: BTreeMap<Band, Array2<f64>>,
    /// True where the pixel is inside the AOI and has a valid observation.
    pub valid: Array2<bool>,
    /// Number of pixels inside the AOI.
    pub aoi_pixels: usize,
    /// Valid pixels divided by AOI pixels.
    pub valid_fraction: f64,
    /// Scenes that contributed at least one pixel, oldest first.
    pub scene_ids: Vec<Uuid>,
    /// Hex SHA-256 over the window and contributing scene ids.
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl Composite {
    pub fn summary(&self, supersedes: Option<Uuid>) -> CompositeSummary {
        CompositeSummary {
            id: self.id,
            site_id: self.site_id,
            window: self.window,
            observed_at: self.observed_at,
            aoi_pixels: self.aoi_pixels,
            valid_fraction: self.valid_fraction,
            scene_ids: self.scene_ids.clone(),
            fingerprint: self.fingerprint.clone(),
            created_at: self.created_at,
            supersedes,
        }
    }
}

/// Archived record of a composite, without the pixel data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSummary {
    pub id: Uuid,
    pub site_id: Uuid,
    pub window: DateRange,
    pub observed_at: DateTime<Utc>,
    pub aoi_pixels: usize,
    pub valid_fraction: f64,
    pub scene_ids: Vec<Uuid>,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    /// Earlier composite for the same window that this one replaces.
    #[serde(default)]
    pub supersedes: Option<Uuid>,
}

/// One spectral index evaluated over a composite.
///
/// Invalid pixels carry NaN in `values` and `false` in `valid`; consumers must
/// only read values where `valid` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRaster {
    pub kind: IndexKind,
    pub site_id: Uuid,
    pub composite_id: Uuid,
    pub observed_at: DateTime<Utc>,
    pub values: Array2<f64>,
    pub valid: Array2<bool>,
    /// AOI pixel count inherited from the composite.
    pub aoi_pixels: usize,
}

impl IndexRaster {
    pub fn valid_pixels(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Valid pixels as a share of AOI pixels (0.0 for an empty AOI).
    pub fn valid_fraction(&self) -> f64 {
        if self.aoi_pixels == 0 {
            return 0.0;
        }
        self.valid_pixels() as f64 / self.aoi_pixels as f64
    }

    /// Mean over valid pixels, or `None` if there are none.
    pub fn spatial_mean(&self) -> Option<f64> {
        let (sum, n) = self
            .values
            .iter()
            .zip(self.valid.iter())
            .filter(|(_, &ok)| ok)
            .fold((0.0, 0usize), |(s, n), (&v, _)| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}

/// Summary statistics of an index raster over its valid pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub valid_pixels: usize,
}
