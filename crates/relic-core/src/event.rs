// crates/relic-core/src/event.rs
//
// Audit records produced by the detection pipeline: change events, the
// observation log used for replay, and per-tick outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::index::IndexKind;

/// Alert tier of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// sensitivity <= |z| < 2 * sensitivity
    Moderate,
    /// |z| >= 2 * sensitivity
    Severe,
}

impl Severity {
    pub fn classify(abs_z: f64, sensitivity: f64) -> Self {
        if abs_z >= 2.0 * sensitivity {
            Severity::Severe
        } else {
            Severity::Moderate
        }
    }
}

/// Sign of the deviation from the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

/// A statistically significant deviation. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub site_id: Uuid,
    pub index: IndexKind,
    pub observed_at: DateTime<Utc>,
    pub emitted_at: DateTime<Utc>,
    /// Spatial mean of the index at `observed_at`.
    pub value: f64,
    pub baseline_mean: f64,
    /// Standard deviation used for the z-score (after the variance floor).
    pub baseline_std: f64,
    pub z_score: f64,
    /// Share of valid pixels whose own deviation crossed the pixel threshold.
    pub affected_fraction: f64,
    pub severity: Severity,
    pub direction: Direction,
    pub composite_id: Uuid,
}

/// What the detector did with an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Folded into the baseline.
    Absorbed,
    /// Flagged as a change and kept out of the baseline.
    Anomalous,
}

/// One scalar observation evaluated against a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub index: IndexKind,
    pub observed_at: DateTime<Utc>,
    pub value: f64,
    pub valid_fraction: f64,
    pub composite_id: Uuid,
    pub disposition: Disposition,
}

/// Why a tick did not produce an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientData,
    NoNewData,
}

/// Outcome of one (site, index, tick) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    Succeeded { event_emitted: bool },
    Skipped { reason: SkipReason },
    Failed { kind: ErrorKind, message: String },
}

impl TickOutcome {
    /// Short label for logs and tables.
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Succeeded { event_emitted: true } => "changed",
            TickOutcome::Succeeded { event_emitted: false } => "ok",
            TickOutcome::Skipped { .. } => "skipped",
            TickOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub site_id: Uuid,
    pub index: IndexKind,
    /// Scheduled tick time (end of the compositing window).
    pub tick_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: TickOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::classify(2.5, 2.5), Severity::Moderate);
        assert_eq!(Severity::classify(4.99, 2.5), Severity::Moderate);
        assert_eq!(Severity::classify(5.0, 2.5), Severity::Severe);
    }

    #[test]
    fn test_tick_outcome_json_shape() {
        let o = TickOutcome::Skipped {
            reason: SkipReason::NoNewData,
        };
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "no_new_data");
        assert_eq!(o.label(), "skipped");
    }
}
