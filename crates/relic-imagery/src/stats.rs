// crates/relic-imagery/src/stats.rs

use relic_core::{IndexRaster, IndexStats};

/// Region statistics over the valid pixels of an index raster.
///
/// Returns `None` when the raster has no valid pixel.
pub fn stats(raster: &IndexRaster) -> Option<IndexStats> {
    let values: Vec<f64> = raster
        .values
        .iter()
        .zip(raster.valid.iter())
        .filter_map(|(&v, &ok)| ok.then_some(v))
        .collect();
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(IndexStats {
        mean,
        std_dev: variance.sqrt(),
        min,
        max,
        valid_pixels: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ndarray::array;
    use relic_core::IndexKind;
    use uuid::Uuid;

    #[test]
    fn test_stats_over_valid_pixels() {
        let r = IndexRaster {
            kind: IndexKind::Ndvi,
            site_id: Uuid::now_v7(),
            composite_id: Uuid::now_v7(),
            observed_at: Utc::now(),
            values: array![[0.2, 0.4], [f64::NAN, 99.0]],
            valid: array![[true, true], [false, false]],
            aoi_pixels: 4,
        };
        let s = stats(&r).unwrap();
        assert!((s.mean - 0.3).abs() < 1e-12);
        assert!((s.std_dev - 0.1).abs() < 1e-12);
        assert_eq!(s.min, 0.2);
        assert_eq!(s.max, 0.4);
        assert_eq!(s.valid_pixels, 2);
    }
}
