// crates/relic-detect/src/pixel.rs
//
// Per-pixel baselines, used to size the affected area of a change.

use ndarray::Zip;

use relic_core::{Baseline, IndexRaster, MonitoringConfig, PixelBaseline};

use crate::stats::{z_score, Accumulator};

/// Fold the valid pixels of `raster` into a per-pixel baseline.
///
/// Every pixel's accumulated weight is decayed by `factor` first. A missing
/// baseline or one whose shape no longer matches the raster starts from zero.
pub fn absorb_pixels(previous: Option<PixelBaseline>, raster: &IndexRaster, factor: f64) -> PixelBaseline {
    let shape = raster.values.dim();
    let mut pixel = match previous {
        Some(p) if p.shape() == shape => p,
        Some(_) => {
            tracing::debug!(
                site_id = %raster.site_id,
                index = %raster.kind,
                "Pixel baseline shape changed; restarting it"
            );
            PixelBaseline::zeros(shape)
        }
        None => PixelBaseline::zeros(shape),
    };

    Zip::from(&mut pixel.mean)
        .and(&mut pixel.m2)
        .and(&mut pixel.weight)
        .and(&raster.values)
        .and(&raster.valid)
        .for_each(|mean, m2, weight, &v, &ok| {
            let mut acc = Accumulator {
                mean: *mean,
                m2: *m2,
                weight: *weight,
            };
            acc.decay(factor);
            if ok {
                acc.absorb(v);
            }
            *mean = acc.mean;
            *m2 = acc.m2;
            *weight = acc.weight;
        });
    pixel
}

/// Share of valid pixels in `raster` whose own |z| reaches
/// `config.pixel_z_threshold`.
///
/// Each pixel is scored against its per-pixel baseline when one exists for it
/// (matching shape and non-zero weight), and against the scalar baseline
/// otherwise. Returns 0.0 for a raster with no valid pixel.
pub fn affected_fraction(baseline: &Baseline, raster: &IndexRaster, config: &MonitoringConfig) -> f64 {
    let pixel = baseline
        .pixel
        .as_ref()
        .filter(|p| p.shape() == raster.values.dim());

    let mut valid = 0usize;
    let mut affected = 0usize;
    for ((idx, &v), &ok) in raster.values.indexed_iter().zip(raster.valid.iter()) {
        if !ok {
            continue;
        }
        valid += 1;
        let (mean, variance) = match pixel {
            Some(p) if p.weight[idx] > 0.0 => (p.mean[idx], p.m2[idx] / p.weight[idx]),
            _ => (baseline.mean, baseline.variance),
        };
        let (z, _) = z_score(v, mean, variance, config.variance_floor);
        if z.abs() >= config.pixel_z_threshold {
            affected += 1;
        }
    }
    if valid == 0 {
        0.0
    } else {
        affected as f64 / valid as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ndarray::{array, Array2};
    use relic_core::IndexKind;
    use uuid::Uuid;

    fn raster(values: Array2<f64>, valid: Array2<bool>) -> IndexRaster {
        IndexRaster {
            kind: IndexKind::Ndvi,
            site_id: Uuid::now_v7(),
            composite_id: Uuid::now_v7(),
            observed_at: Utc::now(),
            aoi_pixels: values.len(),
            values,
            valid,
        }
    }

    #[test]
    fn test_absorb_pixels_skips_invalid() {
        let r = raster(array![[0.5, f64::NAN]], array![[true, false]]);
        let p = absorb_pixels(None, &r, 1.0);
        assert_eq!(p.weight, array![[1.0, 0.0]]);
        assert_eq!(p.mean[[0, 0]], 0.5);
        assert_eq!(p.mean[[0, 1]], 0.0);
    }

    #[test]
    fn test_absorb_pixels_restarts_on_shape_change() {
        let first = absorb_pixels(None, &raster(array![[0.5]], array![[true]]), 1.0);
        let r = raster(array![[0.1, 0.2]], array![[true, true]]);
        let p = absorb_pixels(Some(first), &r, 1.0);
        assert_eq!(p.shape(), (1, 2));
        assert_eq!(p.weight, array![[1.0, 1.0]]);
    }

    #[test]
    fn test_affected_fraction_per_pixel() {
        let config = MonitoringConfig::default();
        let mut b = Baseline::new(Uuid::now_v7(), IndexKind::Ndvi);
        b.mean = 0.6;
        b.variance = 0.0004;
        let mut pixel = PixelBaseline::zeros((1, 4));
        pixel.mean.fill(0.6);
        pixel.m2.fill(0.0004 * 10.0);
        pixel.weight.fill(10.0);
        b.pixel = Some(pixel);

        // Two of three valid pixels drop by 10 std; the fourth is masked.
        let r = raster(
            array![[0.4, 0.4, 0.6, 0.0]],
            array![[true, true, true, false]],
        );
        let f = affected_fraction(&b, &r, &config);
        assert!((f - 2.0 / 3.0).abs() < 1e-12, "got {}", f);
    }

    #[test]
    fn test_affected_fraction_falls_back_to_scalar() {
        let config = MonitoringConfig::default();
        let mut b = Baseline::new(Uuid::now_v7(), IndexKind::Ndvi);
        b.mean = 0.6;
        b.variance = 0.0004;
        let r = raster(array![[0.3, 0.6]], array![[true, true]]);
        assert!((affected_fraction(&b, &r, &config) - 0.5).abs() < 1e-12);
    }
}
