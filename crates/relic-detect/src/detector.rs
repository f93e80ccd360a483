// crates/relic-detect/src/detector.rs
//
// Per-(site, index) change detection.
//
//   ColdStart --absorb x min_samples--> Established
//
// Cold start only learns. An established baseline scores each observation
// as z = (x - mean) / sqrt(max(variance, variance_floor)); |z| below the site
// sensitivity is absorbed, anything else becomes a change event and is left
// out of the baseline so one anomaly cannot drag the reference with it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use relic_core::{
    Baseline, BaselineState, ChangeEvent, Direction, Disposition, IndexRaster, MonitoringConfig,
    ObservationRecord, RelicError, Severity,
};

use crate::pixel::{absorb_pixels, affected_fraction};
use crate::stats::{absorb_scalar, baseline_decay, z_score};

/// Everything one evaluation produces. The caller commits all of it atomically.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The baseline to store in place of the one that was evaluated against.
    pub baseline: Baseline,
    pub observation: ObservationRecord,
    pub event: Option<ChangeEvent>,
}

/// Result of offering an index raster to a baseline.
#[derive(Debug, Clone)]
pub enum Assessment {
    Evaluated(Evaluation),
    /// The raster's observation time equals the latest one already evaluated;
    /// nothing to do.
    NoNewData,
}

/// Evaluate `raster` against `baseline`.
///
/// Pure: the input baseline is never modified. `evaluated_at` stamps the new
/// baseline and any event.
///
/// # Errors
/// * `InsufficientData` if the raster's valid fraction is below
///   `config.min_valid_fraction`.
/// * `OutOfOrderObservation` if the raster predates the baseline's latest
///   observation.
/// * `Pipeline` if the raster belongs to another site or index, or its mean is
///   not finite.
pub fn evaluate(
    baseline: &Baseline,
    raster: &IndexRaster,
    config: &MonitoringConfig,
    evaluated_at: DateTime<Utc>,
) -> Result<Assessment, RelicError> {
    if raster.site_id != baseline.site_id || raster.kind != baseline.index {
        return Err(RelicError::Pipeline(format!(
            "raster for {}/{} offered to baseline {}/{}",
            raster.site_id, raster.kind, baseline.site_id, baseline.index
        )));
    }

    let valid_fraction = raster.valid_fraction();
    if valid_fraction < config.min_valid_fraction {
        return Err(RelicError::InsufficientData {
            valid_fraction,
            required: config.min_valid_fraction,
        });
    }

    let observed_at = raster.observed_at;
    if let Some(last) = baseline.last_observation_at {
        if observed_at < last {
            return Err(RelicError::OutOfOrderObservation {
                observed_at,
                last_observation_at: last,
            });
        }
        if observed_at == last {
            return Ok(Assessment::NoNewData);
        }
    }

    let x = raster
        .spatial_mean()
        .ok_or_else(|| RelicError::no_data(config.min_valid_fraction))?;
    if !x.is_finite() {
        return Err(RelicError::Pipeline(format!(
            "non-finite spatial mean for {}/{}",
            raster.site_id, raster.kind
        )));
    }

    let mut next = baseline.clone();
    next.last_observation_at = Some(observed_at);
    next.last_updated = evaluated_at;

    let mut event = None;
    let disposition = match baseline.state {
        BaselineState::ColdStart => Disposition::Absorbed,
        BaselineState::Established => {
            let (z, std) = z_score(x, baseline.mean, baseline.variance, config.variance_floor);
            if z.abs() < config.sensitivity {
                Disposition::Absorbed
            } else {
                event = Some(ChangeEvent {
                    id: Uuid::now_v7(),
                    site_id: baseline.site_id,
                    index: baseline.index.clone(),
                    observed_at,
                    emitted_at: evaluated_at,
                    value: x,
                    baseline_mean: baseline.mean,
                    baseline_std: std,
                    z_score: z,
                    affected_fraction: affected_fraction(baseline, raster, config),
                    severity: Severity::classify(z.abs(), config.sensitivity),
                    direction: if z > 0.0 {
                        Direction::Increase
                    } else {
                        Direction::Decrease
                    },
                    composite_id: raster.composite_id,
                });
                Disposition::Anomalous
            }
        }
    };

    if disposition == Disposition::Absorbed {
        let factor = baseline_decay(baseline, &config.aging, observed_at);
        next.pixel = Some(absorb_pixels(next.pixel.take(), raster, factor));
        absorb_scalar(&mut next, x, observed_at, config);
    }

    let observation = ObservationRecord {
        id: Uuid::now_v7(),
        site_id: baseline.site_id,
        index: baseline.index.clone(),
        observed_at,
        value: x,
        valid_fraction,
        composite_id: raster.composite_id,
        disposition,
    };

    Ok(Assessment::Evaluated(Evaluation {
        baseline: next,
        observation,
        event,
    }))
}
