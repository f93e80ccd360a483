// crates/relic-detect/src/aging.rs
//
// Time-decay of baseline statistics.
//
// Under exponential aging the accumulated weight (and sum of squared
// deviations) of a baseline halves every half-life, so observations from
// years ago stop dominating the mean and the baseline tracks slow seasonal
// drift like an EWMA.

use chrono::{DateTime, Utc};

use relic_core::AgingPolicy;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Multiplier applied to accumulated weight after `elapsed_days`.
///
/// Always in (0, 1]. Non-positive elapsed time never decays.
pub fn decay_factor(policy: &AgingPolicy, elapsed_days: f64) -> f64 {
    match policy {
        AgingPolicy::None => 1.0,
        AgingPolicy::Exponential { half_life_days } => {
            if elapsed_days <= 0.0 || !elapsed_days.is_finite() {
                return 1.0;
            }
            // 0.5^(elapsed / half_life)
            0.5_f64.powf(elapsed_days / half_life_days)
        }
    }
}

/// Decay factor between two instants (`None` for `from` means nothing to decay).
pub fn decay_between(policy: &AgingPolicy, from: Option<DateTime<Utc>>, to: DateTime<Utc>) -> f64 {
    match from {
        Some(from) => {
            let elapsed = (to - from).num_milliseconds() as f64 / MILLIS_PER_DAY;
            decay_factor(policy, elapsed)
        }
        None => 1.0,
    }
}
