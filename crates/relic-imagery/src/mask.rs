// crates/relic-imagery/src/mask.rs
//
// Per-scene pixel usability: quality flag, AOI membership, and finite
// reflectance in every band the composite will carry.

use ndarray::{Array2, Zip};

use relic_core::{Band, QualityFlag, Scene};

/// Pixels of `scene` that can contribute to a composite.
///
/// A pixel is usable when it lies in `aoi`, its quality flag is
/// [`QualityFlag::Valid`], and every band in `bands` holds a finite value.
/// Bands missing from the scene make every pixel unusable.
pub fn usable_mask(scene: &Scene, aoi: &Array2<bool>, bands: &[Band]) -> Array2<bool> {
    let mut mask = Array2::from_elem(aoi.dim(), false);
    Zip::from(&mut mask)
        .and(aoi)
        .and(&scene.quality)
        .for_each(|m, &inside, &q| *m = inside && q == QualityFlag::Valid);

    for band in bands {
        match scene.bands.get(band) {
            Some(raster) => {
                Zip::from(&mut mask)
                    .and(raster)
                    .for_each(|m, &v| *m = *m && v.is_finite());
            }
            None => {
                mask.fill(false);
                break;
            }
        }
    }
    mask
}

/// Number of set pixels.
pub fn count(mask: &Array2<bool>) -> usize {
    mask.iter().filter(|&&m| m).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ndarray::array;
    use relic_core::GridSpec;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn scene() -> Scene {
        let mut bands = BTreeMap::new();
        bands.insert(Band::B4, array![[0.1, 0.1], [f64::NAN, 0.1]]);
        bands.insert(Band::B8, array![[0.3, 0.3], [0.3, 0.3]]);
        Scene {
            id: Uuid::now_v7(),
            site_id: Uuid::now_v7(),
            acquired_at: Utc::now(),
            grid: GridSpec {
                rows: 2,
                cols: 2,
                origin_x: 0.0,
                origin_y: 2.0,
                pixel_width: 1.0,
                pixel_height: 1.0,
                crs: "EPSG:32635".to_string(),
            },
            bands,
            quality: array![
                [QualityFlag::Valid, QualityFlag::Cloud],
                [QualityFlag::Valid, QualityFlag::Valid]
            ],
            cloud_cover_pct: 10.0,
        }
    }

    #[test]
    fn test_usable_mask_combines_quality_aoi_and_finiteness() {
        let aoi = array![[true, true], [true, false]];
        let mask = usable_mask(&scene(), &aoi, &[Band::B4, Band::B8]);
        assert_eq!(mask, array![[true, false], [false, false]]);
        assert_eq!(count(&mask), 1);
    }

    #[test]
    fn test_missing_band_masks_everything() {
        let aoi = Array2::from_elem((2, 2), true);
        let mask = usable_mask(&scene(), &aoi, &[Band::B11]);
        assert_eq!(count(&mask), 0);
    }
}
