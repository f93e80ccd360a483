// crates/relic-core/src/scene.rs
//
// Raw imagery as delivered by an imagery source, plus the query types used
// to ask for it.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use geo::Polygon;
use ndarray::Array2;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::band::Band;
use crate::error::RelicError;
use crate::geometry::GridSpec;
use crate::site::Site;

/// Per-pixel quality classification from the scene classification layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    Valid,
    Cloud,
    Shadow,
    NoData,
}

/// One acquisition over a site. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: Uuid,
    pub site_id: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub grid: GridSpec,
    /// Surface reflectance per band, shape `(grid.rows, grid.cols)`.
    /// NaN marks nodata; in JSON it is written and read as `null`.
    #[serde(deserialize_with = "deserialize_bands")]
    pub bands: BTreeMap<Band, Array2<f64>>,
    /// Quality mask, shape `(grid.rows, grid.cols)`.
    pub quality: Array2<QualityFlag>,
    /// Scene-level cloud cover reported by the provider, in percent.
    pub cloud_cover_pct: f64,
}

fn deserialize_bands<'de, D>(deserializer: D) -> Result<BTreeMap<Band, Array2<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<Band, Array2<Option<f64>>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(band, values)| (band, values.mapv(|v| v.unwrap_or(f64::NAN))))
        .collect())
}

impl Scene {
    /// Check that every raster matches the grid and cloud cover is a percentage.
    pub fn check_consistency(&self) -> Result<(), RelicError> {
        self.grid.check_shape(self.quality.dim(), &format!("scene {} quality mask", self.id))?;
        for (band, raster) in &self.bands {
            self.grid
                .check_shape(raster.dim(), &format!("scene {} band {}", self.id, band))?;
        }
        if !(0.0..=100.0).contains(&self.cloud_cover_pct) {
            return Err(RelicError::Pipeline(format!(
                "scene {} cloud cover {} is not a percentage",
                self.id, self.cloud_cover_pct
            )));
        }
        Ok(())
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RelicError> {
        if start >= end {
            return Err(RelicError::Validation(format!(
                "Date range start {} must precede end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days`-long window ending (exclusively) just after `at`.
    ///
    /// Scenes acquired exactly at `at` fall inside the window.
    pub fn ending_at(at: DateTime<Utc>, days: u32) -> Self {
        let end = at + Duration::milliseconds(1);
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }
}

/// Spatial query handed to an imagery source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaOfInterest {
    pub site_id: Uuid,
    pub polygon: Polygon<f64>,
    pub crs: String,
}

impl From<&Site> for AreaOfInterest {
    fn from(site: &Site) -> Self {
        Self {
            site_id: site.id,
            polygon: site.geometry.clone(),
            crs: site.crs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_ending_at_includes_tick_instant() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let w = DateRange::ending_at(at, 30);
        assert!(w.contains(at));
        assert!(w.contains(at - Duration::days(29)));
        assert!(!w.contains(at - Duration::days(31)));
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(DateRange::new(at, at).is_err());
        assert!(DateRange::new(at, at + Duration::days(1)).is_ok());
    }

    #[test]
    fn test_consistency_detects_shape_mismatch() {
        let grid = GridSpec {
            rows: 2,
            cols: 2,
            origin_x: 0.0,
            origin_y: 2.0,
            pixel_width: 1.0,
            pixel_height: 1.0,
            crs: "EPSG:32635".to_string(),
        };
        let mut bands = BTreeMap::new();
        bands.insert(Band::B4, Array2::zeros((2, 3)));
        let scene = Scene {
            id: Uuid::now_v7(),
            site_id: Uuid::now_v7(),
            acquired_at: Utc::now(),
            grid,
            bands,
            quality: Array2::from_elem((2, 2), QualityFlag::Valid),
            cloud_cover_pct: 5.0,
        };
        assert!(scene.check_consistency().is_err());
    }
}
