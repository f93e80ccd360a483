// crates/relic-detect/src/pairwise.rs
//
// Before/after change map between two index rasters of the same site.
//
// Complements the temporal detector for ad-hoc operator comparisons:
// `delta = after - before`, classified per pixel by a fixed threshold.

use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;

use relic_core::{IndexRaster, RelicError};

/// Default |delta| threshold for a significant change.
pub const DEFAULT_THRESHOLD: f64 = 0.2;

/// Per-pixel change category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClass {
    /// delta < -threshold
    Decrease,
    NoChange,
    /// delta > threshold
    Increase,
    /// Invalid in either raster.
    Invalid,
}

/// Result of a pairwise comparison.
#[derive(Debug, Clone)]
pub struct ChangeMap {
    /// `after - before`; NaN where either input is invalid.
    pub delta: Array2<f64>,
    pub classes: Array2<ChangeClass>,
    pub threshold: f64,
    pub summary: ChangeSummary,
}

/// Class shares over pixels valid in both rasters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChangeSummary {
    pub valid_pixels: usize,
    pub decrease_fraction: f64,
    pub no_change_fraction: f64,
    pub increase_fraction: f64,
    /// Mean delta over valid pixels, `None` if there are none.
    pub mean_delta: Option<f64>,
}

/// Compare two rasters of the same index on the same grid.
///
/// # Errors
/// `Validation` for a non-positive threshold or mismatched index kinds;
/// `Pipeline` for mismatched shapes.
pub fn difference(before: &IndexRaster, after: &IndexRaster, threshold: f64) -> Result<ChangeMap, RelicError> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(RelicError::Validation(format!(
            "change threshold must be > 0, got {}",
            threshold
        )));
    }
    if before.kind != after.kind {
        return Err(RelicError::Validation(format!(
            "cannot compare {} with {}",
            before.kind, after.kind
        )));
    }
    let (rows, cols) = before.values.dim();
    if after.values.dim() != (rows, cols) {
        let (ar, ac) = after.values.dim();
        return Err(RelicError::Pipeline(format!(
            "raster shapes differ: {}x{} vs {}x{}",
            rows, cols, ar, ac
        )));
    }

    let cells: Vec<(f64, ChangeClass)> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..cols).map(move |col| {
                let idx = [row, col];
                if !(before.valid[idx] && after.valid[idx]) {
                    return (f64::NAN, ChangeClass::Invalid);
                }
                let d = after.values[idx] - before.values[idx];
                let class = if d < -threshold {
                    ChangeClass::Decrease
                } else if d > threshold {
                    ChangeClass::Increase
                } else {
                    ChangeClass::NoChange
                };
                (d, class)
            })
        })
        .collect();

    let mut counts = [0usize; 3];
    let mut sum = 0.0;
    for (d, class) in &cells {
        match class {
            ChangeClass::Decrease => counts[0] += 1,
            ChangeClass::NoChange => counts[1] += 1,
            ChangeClass::Increase => counts[2] += 1,
            ChangeClass::Invalid => continue,
        }
        sum += d;
    }
    let valid_pixels: usize = counts.iter().sum();
    let share = |n: usize| if valid_pixels == 0 { 0.0 } else { n as f64 / valid_pixels as f64 };

    let summary = ChangeSummary {
        valid_pixels,
        decrease_fraction: share(counts[0]),
        no_change_fraction: share(counts[1]),
        increase_fraction: share(counts[2]),
        mean_delta: (valid_pixels > 0).then(|| sum / valid_pixels as f64),
    };

    Ok(ChangeMap {
        delta: Array2::from_shape_fn((rows, cols), |(r, c)| cells[r * cols + c].0),
        classes: Array2::from_shape_fn((rows, cols), |(r, c)| cells[r * cols + c].1),
        threshold,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ndarray::array;
    use relic_core::IndexKind;
    use uuid::Uuid;

    fn raster(values: Array2<f64>, valid: Array2<bool>) -> IndexRaster {
        IndexRaster {
            kind: IndexKind::Ndvi,
            site_id: Uuid::nil(),
            composite_id: Uuid::now_v7(),
            observed_at: Utc::now(),
            aoi_pixels: values.len(),
            values,
            valid,
        }
    }

    #[test]
    fn test_classifies_and_summarises() {
        let before = raster(array![[0.6, 0.6, 0.6, 0.6]], array![[true, true, true, true]]);
        let after = raster(array![[0.3, 0.65, 0.9, 0.0]], array![[true, true, true, false]]);
        let map = difference(&before, &after, DEFAULT_THRESHOLD).unwrap();

        assert_eq!(
            map.classes,
            array![[
                ChangeClass::Decrease,
                ChangeClass::NoChange,
                ChangeClass::Increase,
                ChangeClass::Invalid
            ]]
        );
        assert_eq!(map.summary.valid_pixels, 3);
        assert!((map.summary.decrease_fraction - 1.0 / 3.0).abs() < 1e-12);
        assert!(map.delta[[0, 3]].is_nan());
        let mean = map.summary.mean_delta.unwrap();
        assert!((mean - (-0.3 + 0.05 + 0.3) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_threshold_and_shapes() {
        let a = raster(array![[0.1]], array![[true]]);
        let b = raster(array![[0.1, 0.2]], array![[true, true]]);
        assert!(matches!(difference(&a, &a, 0.0), Err(RelicError::Validation(_))));
        assert!(matches!(difference(&a, &b, 0.2), Err(RelicError::Pipeline(_))));
    }
}
