// crates/relic-core/src/baseline.rs

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::index::IndexKind;

/// Lifecycle of a baseline.
///
///   ColdStart --(sample_count >= min_samples)--> Established
///
/// Replay rebuilds from scratch and may land in either state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineState {
    /// Still accumulating; observations are absorbed, never flagged.
    ColdStart,
    /// Observations are scored against the running statistics.
    Established,
}

/// Running statistics of one index at one site.
///
/// `mean` and `m2` are a weighted incremental (West) accumulator:
/// `variance == m2 / weight` whenever `weight > 0`. Under exponential aging
/// `weight` and `m2` decay between absorptions, so `weight` can be far below
/// `sample_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub site_id: Uuid,
    pub index: IndexKind,
    pub state: BaselineState,
    pub mean: f64,
    /// Weighted population variance.
    pub variance: f64,
    /// Weighted sum of squared deviations from the mean.
    pub m2: f64,
    /// Number of observations ever absorbed.
    pub sample_count: u64,
    /// Effective (possibly decayed) total weight.
    pub weight: f64,
    pub last_updated: DateTime<Utc>,
    /// Timestamp of the latest observation evaluated against this baseline,
    /// absorbed or not.
    #[serde(default)]
    pub last_observation_at: Option<DateTime<Utc>>,
    /// Timestamp of the latest absorbed observation; aging is measured from here.
    #[serde(default)]
    pub last_absorbed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pixel: Option<PixelBaseline>,
}

impl Baseline {
    /// Empty cold-start baseline.
    pub fn new(site_id: Uuid, index: IndexKind) -> Self {
        Self {
            site_id,
            index,
            state: BaselineState::ColdStart,
            mean: 0.0,
            variance: 0.0,
            m2: 0.0,
            sample_count: 0,
            weight: 0.0,
            last_updated: Utc::now(),
            last_observation_at: None,
            last_absorbed_at: None,
            pixel: None,
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }

    pub fn is_established(&self) -> bool {
        self.state == BaselineState::Established
    }
}

/// Per-pixel running mean and variance, same accumulator as [`Baseline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelBaseline {
    pub mean: Array2<f64>,
    pub m2: Array2<f64>,
    pub weight: Array2<f64>,
}

impl PixelBaseline {
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            mean: Array2::zeros(shape),
            m2: Array2::zeros(shape),
            weight: Array2::zeros(shape),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mean.dim()
    }
}
