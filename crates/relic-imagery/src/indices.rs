// crates/relic-imagery/src/indices.rs
//
// Spectral index evaluation over a composite.
//
// All formulas take surface reflectance. A pixel is valid in the output only
// if it was valid in the composite and the formula produced a finite value
// within the index's range; everything else is masked, never zero-filled.

use ndarray::Array2;
use rayon::prelude::*;

use relic_core::{Band, Composite, IndexFormula, IndexKind, IndexRaster, RelicError};

/// Denominators smaller than this in magnitude invalidate the pixel.
pub const MIN_DENOMINATOR: f64 = 1e-10;

/// Evaluate `kind` over `composite`.
///
/// # Errors
/// `Pipeline` if a band the index needs is absent from the composite or a
/// raster does not match the composite grid.
pub fn compute(composite: &Composite, kind: &IndexKind) -> Result<IndexRaster, RelicError> {
    let shape = (composite.grid.rows, composite.grid.cols);
    composite.grid.check_shape(composite.valid.dim(), "composite mask")?;

    let formula = kind.formula();
    let mut inputs: Vec<(Band, &Array2<f64>)> = Vec::new();
    for band in kind.required_bands() {
        let raster = composite.bands.get(&band).ok_or_else(|| {
            RelicError::Pipeline(format!(
                "composite {} has no band {} required by {}",
                composite.id, band, kind
            ))
        })?;
        composite.grid.check_shape(raster.dim(), &format!("composite band {}", band))?;
        inputs.push((band, raster));
    }
    let range = kind.value_range();

    let (rows, cols) = shape;
    let cells: Vec<Option<f64>> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            let inputs = &inputs;
            let valid = &composite.valid;
            (0..cols).map(move |col| {
                if !valid[[row, col]] {
                    return None;
                }
                let value_of = |band: Band| {
                    inputs
                        .iter()
                        .find(|(b, _)| *b == band)
                        .map(|(_, r)| r[[row, col]])
                        .unwrap_or(f64::NAN)
                };
                evaluate(&formula, value_of).filter(|v| in_range(*v, range))
            })
        })
        .collect();

    let values = Array2::from_shape_fn(shape, |(r, c)| cells[r * cols + c].unwrap_or(f64::NAN));
    let valid = Array2::from_shape_fn(shape, |(r, c)| cells[r * cols + c].is_some());

    Ok(IndexRaster {
        kind: kind.clone(),
        site_id: composite.site_id,
        composite_id: composite.id,
        observed_at: composite.observed_at,
        values,
        valid,
        aoi_pixels: composite.aoi_pixels,
    })
}

/// Evaluate a formula for one pixel. `None` marks the pixel invalid.
pub fn evaluate(formula: &IndexFormula, band: impl Fn(Band) -> f64) -> Option<f64> {
    let value = match *formula {
        IndexFormula::NormalizedDifference { a, b } => normalized(band(a), band(b))?,
        IndexFormula::Savi { nir, red, l } => {
            let (nir, red) = (band(nir), band(red));
            divide((nir - red) * (1.0 + l), nir + red + l)?
        }
        IndexFormula::Evi { nir, red, blue } => {
            let (nir, red, blue) = (band(nir), band(red), band(blue));
            divide(2.5 * (nir - red), nir + 6.0 * red - 7.5 * blue + 1.0)?
        }
        IndexFormula::Bsi { swir, red, nir, blue } => {
            normalized(band(swir) + band(red), band(nir) + band(blue))?
        }
        IndexFormula::Ratio { a, b } => divide(band(a), band(b))?,
        IndexFormula::Difference { a, b } => band(a) - band(b),
    };
    value.is_finite().then_some(value)
}

fn normalized(a: f64, b: f64) -> Option<f64> {
    divide(a - b, a + b)
}

fn divide(num: f64, den: f64) -> Option<f64> {
    if !num.is_finite() || !den.is_finite() || den.abs() < MIN_DENOMINATOR {
        return None;
    }
    Some(num / den)
}

fn in_range(v: f64, range: Option<(f64, f64)>) -> bool {
    match range {
        Some((lo, hi)) => v >= lo && v <= hi,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ndarray::array;
    use relic_core::{CustomFormula, CustomIndex, DateRange, GridSpec};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn composite(bands: Vec<(Band, Array2<f64>)>, valid: Array2<bool>) -> Composite {
        let (rows, cols) = valid.dim();
        let now = Utc::now();
        Composite {
            id: Uuid::now_v7(),
            site_id: Uuid::now_v7(),
            window: DateRange::ending_at(now, 30),
            observed_at: now,
            grid: GridSpec {
                rows,
                cols,
                origin_x: 0.0,
                origin_y: rows as f64,
                pixel_width: 1.0,
                pixel_height: 1.0,
                crs: "EPSG:32635".to_string(),
            },
            bands: bands.into_iter().collect::<BTreeMap<_, _>>(),
            aoi_pixels: rows * cols,
            valid_fraction: 1.0,
            valid,
            scene_ids: vec![],
            fingerprint: String::new(),
            created_at: now,
        }
    }

    #[test]
    fn test_ndvi_values_and_mask() {
        let c = composite(
            vec![
                (Band::B8, array![[0.5, 0.0], [0.3, 0.4]]),
                (Band::B4, array![[0.1, 0.0], [0.3, 0.2]]),
            ],
            array![[true, true], [true, false]],
        );
        let r = compute(&c, &IndexKind::Ndvi).unwrap();
        assert!((r.values[[0, 0]] - 0.4 / 0.6).abs() < 1e-12);
        assert!(!r.valid[[0, 1]], "zero denominator must be invalid");
        assert!(r.values[[1, 0]].abs() < 1e-12);
        assert!(!r.valid[[1, 1]], "composite mask must carry through");
    }

    #[test]
    fn test_valid_pixels_are_bounded_and_finite() {
        // Negative reflectance can push a normalized difference out of range.
        let c = composite(
            vec![
                (Band::B11, array![[0.3, -0.2, 1e-12]]),
                (Band::B8, array![[0.2, 0.1, -1e-12]]),
            ],
            array![[true, true, true]],
        );
        let r = compute(&c, &IndexKind::Ndbi).unwrap();
        for (v, ok) in r.values.iter().zip(r.valid.iter()) {
            if *ok {
                assert!(v.is_finite() && (-1.0..=1.0).contains(v), "bad value {}", v);
            }
        }
        assert!(r.valid[[0, 0]]);
        assert!(!r.valid[[0, 1]]);
        assert!(!r.valid[[0, 2]]);
    }

    #[test]
    fn test_missing_band_is_pipeline_error() {
        let c = composite(vec![(Band::B8, array![[0.5]])], array![[true]]);
        assert!(matches!(compute(&c, &IndexKind::Ndvi), Err(RelicError::Pipeline(_))));
    }

    #[test]
    fn test_savi_and_evi() {
        let bands = |b: Band| match b {
            Band::B8 => 0.5,
            Band::B4 => 0.1,
            Band::B2 => 0.05,
            _ => f64::NAN,
        };
        let savi = evaluate(&IndexKind::Savi.formula(), bands).unwrap();
        assert!((savi - (0.4 * 1.5) / 1.1).abs() < 1e-12);
        let evi = evaluate(&IndexKind::Evi.formula(), bands).unwrap();
        assert!((evi - 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_custom_ratio() {
        let kind = IndexKind::Custom(CustomIndex {
            name: "swir_ratio".to_string(),
            formula: CustomFormula::Ratio,
            band_a: Band::B11,
            band_b: Band::B12,
        });
        let c = composite(
            vec![(Band::B11, array![[0.4, 0.4]]), (Band::B12, array![[0.2, 0.0]])],
            array![[true, true]],
        );
        let r = compute(&c, &kind).unwrap();
        assert!((r.values[[0, 0]] - 2.0).abs() < 1e-12);
        assert!(!r.valid[[0, 1]]);
    }
}
