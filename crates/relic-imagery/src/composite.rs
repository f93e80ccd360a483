// crates/relic-imagery/src/composite.rs
//
// Most-recent-valid-pixel compositing.
//
// Given the scenes acquired over a site in one window, build a single mosaic
// in which each AOI pixel takes its value from the newest scene that saw it
// clearly. Pixels no scene observed cleanly stay invalid.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use ndarray::Array2;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use relic_core::{Band, Composite, DateRange, RelicError, Scene, Site};

use crate::mask::{count, usable_mask};

/// Build the composite for `site` over `window`.
///
/// # Errors
/// * `InsufficientData` when no scene survives filtering, the AOI covers no
///   pixel of the grid, or the valid-pixel fraction is below the site's
///   `min_valid_fraction`.
/// * `Pipeline` when scenes are malformed, are not in the site's CRS, are not
///   co-registered, or share no common band.
pub fn compose(site: &Site, scenes: &[Scene], window: DateRange) -> Result<Composite, RelicError> {
    let config = &site.config;
    let required = config.min_valid_fraction;

    let mut candidates: Vec<&Scene> = Vec::with_capacity(scenes.len());
    for scene in scenes {
        if !window.contains(scene.acquired_at) {
            tracing::debug!(scene_id = %scene.id, acquired_at = %scene.acquired_at, "Scene outside window; ignored");
            continue;
        }
        scene.check_consistency()?;
        if scene.cloud_cover_pct > config.max_cloud_cover_pct {
            tracing::debug!(
                scene_id = %scene.id,
                cloud_cover = scene.cloud_cover_pct,
                max = config.max_cloud_cover_pct,
                "Scene too cloudy; discarded"
            );
            continue;
        }
        candidates.push(scene);
    }

    let Some(first) = candidates.first() else {
        return Err(RelicError::no_data(required));
    };
    let grid = first.grid.clone();
    if grid.crs != site.crs {
        return Err(RelicError::Pipeline(format!(
            "scene {} is in {}, site {} is in {}",
            first.id, grid.crs, site.id, site.crs
        )));
    }
    if let Some(other) = candidates.iter().find(|s| !s.grid.is_aligned_with(&grid)) {
        return Err(RelicError::Pipeline(format!(
            "scene {} is not co-registered with scene {}",
            other.id, first.id
        )));
    }

    let aoi = grid.aoi_mask(&site.geometry);
    let aoi_pixels = count(&aoi);
    if aoi_pixels == 0 {
        return Err(RelicError::no_data(required));
    }

    // Bands present in every candidate scene.
    let mut common: BTreeSet<Band> = first.bands.keys().copied().collect();
    for scene in &candidates[1..] {
        common.retain(|b| scene.bands.contains_key(b));
    }
    if common.is_empty() {
        return Err(RelicError::Pipeline(format!(
            "no band is shared by all {} scenes in window",
            candidates.len()
        )));
    }
    let bands: Vec<Band> = common.into_iter().collect();

    // Oldest first; ties broken by id so the result is deterministic.
    candidates.sort_by(|a, b| a.acquired_at.cmp(&b.acquired_at).then(a.id.cmp(&b.id)));

    let mut usable: Vec<(&Scene, Array2<bool>)> = Vec::with_capacity(candidates.len());
    for scene in candidates {
        let mask = usable_mask(scene, &aoi, &bands);
        if count(&mask) == 0 {
            tracing::debug!(scene_id = %scene.id, "Scene has no clear AOI pixel; discarded");
            continue;
        }
        usable.push((scene, mask));
    }
    if usable.is_empty() {
        return Err(RelicError::no_data(required));
    }

    let (rows, cols) = (grid.rows, grid.cols);
    let source: Vec<Option<usize>> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            let usable = &usable;
            (0..cols).map(move |col| usable.iter().rposition(|(_, mask)| mask[[row, col]]))
        })
        .collect();

    let mut composite_bands: BTreeMap<Band, Array2<f64>> = BTreeMap::new();
    for band in &bands {
        let raster = Array2::from_shape_fn((rows, cols), |(row, col)| match source[row * cols + col] {
            Some(s) => usable[s].0.bands[band][[row, col]],
            None => f64::NAN,
        });
        composite_bands.insert(*band, raster);
    }
    let valid = Array2::from_shape_fn((rows, cols), |(row, col)| source[row * cols + col].is_some());
    let valid_pixels = count(&valid);
    let valid_fraction = valid_pixels as f64 / aoi_pixels as f64;

    if valid_fraction < required {
        return Err(RelicError::InsufficientData {
            valid_fraction,
            required,
        });
    }

    let contributing: BTreeSet<usize> = source.iter().flatten().copied().collect();
    let scene_ids: Vec<Uuid> = contributing.iter().map(|&s| usable[s].0.id).collect();
    let observed_at = contributing
        .iter()
        .map(|&s| usable[s].0.acquired_at)
        .max()
        .ok_or_else(|| RelicError::no_data(required))?;

    Ok(Composite {
        id: Uuid::now_v7(),
        site_id: site.id,
        window,
        observed_at,
        grid,
        bands: composite_bands,
        valid,
        aoi_pixels,
        valid_fraction,
        fingerprint: fingerprint(&window, &scene_ids),
        scene_ids,
        created_at: Utc::now(),
    })
}

/// Hex SHA-256 over the window bounds and the contributing scene ids.
///
/// Two composites with the same fingerprint were built from the same inputs.
pub fn fingerprint(window: &DateRange, scene_ids: &[Uuid]) -> String {
    let mut sorted = scene_ids.to_vec();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(window.start.timestamp_millis().to_le_bytes());
    hasher.update(window.end.timestamp_millis().to_le_bytes());
    for id in &sorted {
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}
