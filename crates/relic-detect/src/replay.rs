// crates/relic-detect/src/replay.rs
//
// Rebuild a baseline from the observation log.
//
// Used after an out-of-order observation is rejected or history is
// backfilled. Observations are re-scored in time order with the current
// configuration; no events are emitted and the per-pixel baseline starts over
// (the log only carries scalar means).

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use relic_core::{
    Baseline, BaselineState, IndexKind, MonitoringConfig, ObservationRecord, RelicError,
};

use crate::stats::{absorb_scalar, z_score};

/// Counts from a replay, for operator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub observations: usize,
    pub absorbed: usize,
    pub anomalous: usize,
    /// Records dropped because another record had the same timestamp.
    pub duplicates: usize,
}

/// Recompute the baseline for (`site_id`, `index`) from `observations`.
///
/// Records for other keys are a `Pipeline` error. Records sharing a
/// timestamp are applied once (the first in log order).
pub fn replay(
    site_id: Uuid,
    index: &IndexKind,
    observations: &[ObservationRecord],
    config: &MonitoringConfig,
    now: DateTime<Utc>,
) -> Result<(Baseline, ReplaySummary), RelicError> {
    if let Some(stray) = observations
        .iter()
        .find(|o| o.site_id != site_id || &o.index != index)
    {
        return Err(RelicError::Pipeline(format!(
            "observation {} belongs to {}/{}, not {}/{}",
            stray.id, stray.site_id, stray.index, site_id, index
        )));
    }

    let mut ordered: Vec<&ObservationRecord> = observations.iter().collect();
    ordered.sort_by_key(|o| o.observed_at);

    let mut baseline = Baseline::new(site_id, index.clone());
    baseline.last_updated = now;
    let mut summary = ReplaySummary {
        observations: observations.len(),
        absorbed: 0,
        anomalous: 0,
        duplicates: 0,
    };

    for obs in ordered {
        if baseline.last_observation_at == Some(obs.observed_at) {
            summary.duplicates += 1;
            continue;
        }
        baseline.last_observation_at = Some(obs.observed_at);

        let absorb = match baseline.state {
            BaselineState::ColdStart => true,
            BaselineState::Established => {
                let (z, _) = z_score(obs.value, baseline.mean, baseline.variance, config.variance_floor);
                z.abs() < config.sensitivity
            }
        };
        if absorb {
            absorb_scalar(&mut baseline, obs.value, obs.observed_at, config);
            summary.absorbed += 1;
        } else {
            summary.anomalous += 1;
        }
    }

    Ok((baseline, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use relic_core::Disposition;

    fn obs(site_id: Uuid, month: i64, value: f64) -> ObservationRecord {
        ObservationRecord {
            id: Uuid::now_v7(),
            site_id,
            index: IndexKind::Ndvi,
            observed_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap() + Duration::days(30 * month),
            value,
            valid_fraction: 1.0,
            composite_id: Uuid::now_v7(),
            disposition: Disposition::Absorbed,
        }
    }

    #[test]
    fn test_replay_is_order_independent() {
        let config = MonitoringConfig::default();
        let site = Uuid::now_v7();
        let values = [0.60, 0.62, 0.58, 0.61, 0.59, 0.60, 0.62, 0.58, 0.60, 0.61, 0.59, 0.60, 0.61];
        let mut log: Vec<_> = values.iter().enumerate().map(|(i, &v)| obs(site, i as i64, v)).collect();

        let (forward, _) = replay(site, &IndexKind::Ndvi, &log, &config, Utc::now()).unwrap();
        log.reverse();
        let (backward, summary) = replay(site, &IndexKind::Ndvi, &log, &config, Utc::now()).unwrap();

        assert_eq!(forward.mean.to_bits(), backward.mean.to_bits());
        assert_eq!(forward.variance.to_bits(), backward.variance.to_bits());
        assert_eq!(backward.state, BaselineState::Established);
        assert_eq!(summary.absorbed, 13);
        assert!(backward.pixel.is_none());
    }

    #[test]
    fn test_replay_skips_anomalies_and_duplicates() {
        let config = MonitoringConfig::default();
        let site = Uuid::now_v7();
        let mut log: Vec<_> = (0..12).map(|i| obs(site, i, 0.6)).collect();
        log.push(obs(site, 12, 0.1));
        log.push(obs(site, 12, 0.1));

        let (b, summary) = replay(site, &IndexKind::Ndvi, &log, &config, Utc::now()).unwrap();
        assert_eq!(summary.anomalous, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(b.sample_count, 12);
        assert!((b.mean - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_replay_rejects_foreign_records() {
        let config = MonitoringConfig::default();
        let log = vec![obs(Uuid::now_v7(), 0, 0.5)];
        assert!(replay(Uuid::now_v7(), &IndexKind::Ndvi, &log, &config, Utc::now()).is_err());
    }
}
