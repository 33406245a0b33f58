//! Order statistics over sample populations
//!
//! Conventions:
//! - `std` is the population standard deviation (ddof = 0)
//! - percentiles interpolate linearly between closest ranks, at position `(n - 1) * q`
//! - `mad` is the scaled median absolute deviation, `scale * median(|x - median(x)|)`,
//!   with [`MAD_NORMAL_SCALE`] making it consistent with the standard deviation of
//!   normally distributed data
//!
//! An empty population, or one containing NaN, yields NaN for every statistic.

use serde::{Deserialize, Serialize};

/// Normal-consistency constant for the median absolute deviation
pub const MAD_NORMAL_SCALE: f64 = 1.4826;

/// Robust summary of a sample population
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustStats {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub mad: f64,
    pub q25: f64,
    pub q75: f64,
}

impl RobustStats {
    /// Statistics of an empty or undefined population
    pub fn undefined() -> Self {
        Self {
            mean: f64::NAN,
            std: f64::NAN,
            median: f64::NAN,
            mad: f64::NAN,
            q25: f64::NAN,
            q75: f64::NAN,
        }
    }

    pub fn from_samples(samples: &[f64], mad_scale: f64) -> Self {
        if samples.is_empty() || samples.iter().any(|v| v.is_nan()) {
            return Self::undefined();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = mean(&sorted);
        let median = percentile_sorted(&sorted, 0.5);
        Self {
            mean,
            std: std_population(&sorted, mean),
            median,
            mad: mad_scale * unscaled_mad(&sorted, median),
            q25: percentile_sorted(&sorted, 0.25),
            q75: percentile_sorted(&sorted, 0.75),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.median.is_nan()
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation about a known mean
pub fn std_population(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Linear-interpolation percentile of an ascending slice, `q` in [0, 1]
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + weight * (sorted[upper] - sorted[lower])
}

pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, 0.5)
}

/// Median of absolute deviations from `center`, without scaling
pub fn unscaled_mad(values: &[f64], center: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Sample counts per bin, the last bin closed on the right; values outside the
/// edges are ignored
pub fn histogram_counts(values: &[f64], edges: &[f64]) -> Vec<u64> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let n_bins = edges.len() - 1;
    let first = edges[0];
    let last = edges[n_bins];
    let mut counts = vec![0u64; n_bins];

    for &value in values {
        if value.is_nan() || value < first || value > last {
            continue;
        }
        // Index of the first edge strictly greater than the value
        let upper = edges.partition_point(|&edge| edge <= value);
        let bin = upper.saturating_sub(1).min(n_bins - 1);
        counts[bin] += 1;
    }
    counts
}
