// crates/relic-detect/src/stats.rs
//
// Weighted incremental mean/variance (West, 1979).
//
// Each absorbed observation has unit weight. Aging shrinks the accumulated
// weight and sum of squares before the next absorption, which preserves the
// mean but lets new observations move it further.

use chrono::{DateTime, Utc};

use relic_core::{AgingPolicy, Baseline, BaselineState, MonitoringConfig};

use crate::aging::decay_between;

/// A running weighted accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Accumulator {
    pub mean: f64,
    pub m2: f64,
    pub weight: f64,
}

impl Accumulator {
    /// Scale accumulated weight by `factor` in (0, 1].
    pub fn decay(&mut self, factor: f64) {
        self.weight *= factor;
        self.m2 *= factor;
    }

    /// Absorb `x` with unit weight.
    pub fn absorb(&mut self, x: f64) {
        let weight = self.weight + 1.0;
        let delta = x - self.mean;
        self.mean += delta / weight;
        self.m2 += delta * (x - self.mean);
        self.m2 = self.m2.max(0.0);
        self.weight = weight;
    }

    /// Weighted population variance (0 when nothing was absorbed).
    pub fn variance(&self) -> f64 {
        if self.weight > 0.0 {
            (self.m2 / self.weight).max(0.0)
        } else {
            0.0
        }
    }
}

/// z-score of `x` against a mean and variance, with a variance floor.
pub fn z_score(x: f64, mean: f64, variance: f64, variance_floor: f64) -> (f64, f64) {
    let std = variance.max(variance_floor).sqrt();
    ((x - mean) / std, std)
}

/// Decay factor that applies to `baseline` before absorbing an observation at `at`.
pub fn baseline_decay(baseline: &Baseline, policy: &AgingPolicy, at: DateTime<Utc>) -> f64 {
    decay_between(policy, baseline.last_absorbed_at, at)
}

/// Fold a scalar observation into `baseline`, aging it first, and advance the
/// state machine. Does not touch `last_observation_at` or the pixel baseline.
pub fn absorb_scalar(baseline: &mut Baseline, x: f64, at: DateTime<Utc>, config: &MonitoringConfig) {
    let factor = baseline_decay(baseline, &config.aging, at);
    let mut acc = Accumulator {
        mean: baseline.mean,
        m2: baseline.m2,
        weight: baseline.weight,
    };
    acc.decay(factor);
    acc.absorb(x);

    baseline.mean = acc.mean;
    baseline.m2 = acc.m2;
    baseline.weight = acc.weight;
    baseline.variance = acc.variance();
    baseline.sample_count += 1;
    baseline.last_absorbed_at = Some(at);
    if baseline.state == BaselineState::ColdStart && baseline.sample_count >= config.min_samples {
        baseline.state = BaselineState::Established;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_two_pass_statistics() {
        let xs = [0.58, 0.61, 0.60, 0.62, 0.59, 0.60];
        let mut acc = Accumulator::default();
        for x in xs {
            acc.absorb(x);
        }
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        assert!((acc.mean - mean).abs() < 1e-12);
        assert!((acc.variance() - var).abs() < 1e-12);
        assert_eq!(acc.weight, n);
    }

    #[test]
    fn test_constant_series_has_zero_variance() {
        let mut acc = Accumulator::default();
        for _ in 0..50 {
            acc.absorb(0.42);
        }
        assert!((acc.mean - 0.42).abs() < 1e-12);
        assert!(acc.variance() < 1e-20);
    }

    #[test]
    fn test_decay_increases_influence_of_new_value() {
        let mut plain = Accumulator::default();
        let mut aged = Accumulator::default();
        for _ in 0..10 {
            plain.absorb(0.0);
            aged.absorb(0.0);
        }
        aged.decay(0.1);
        plain.absorb(1.0);
        aged.absorb(1.0);
        assert!(aged.mean > plain.mean);
        assert!((plain.mean - 1.0 / 11.0).abs() < 1e-12);
        assert!((aged.mean - 1.0 / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_z_score_uses_floor() {
        let (z, std) = z_score(0.61, 0.6, 0.0, 1e-4);
        assert!((std - 0.01).abs() < 1e-12);
        assert!((z - 1.0).abs() < 1e-9);
    }
}
