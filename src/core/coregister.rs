use crate::types::{DebrisCube, DebrisError, DebrisResult};
use chrono::{Duration, NaiveDateTime};
use ndarray::Array3;
use num_traits::Float;

/// Linear interpolation between two consecutive samples
#[inline]
pub fn lerp<F: Float>(v0: F, v1: F, weight: F) -> F {
    v0 + weight * (v1 - v0)
}

/// Position of an exact timestamp on an ascending time axis
pub fn locate_timestamp(time_axis: &[NaiveDateTime], target: NaiveDateTime) -> DebrisResult<usize> {
    time_axis
        .binary_search(&target)
        .map_err(|_| DebrisError::TimestampNotFound(target))
}

/// Time-axis positions sampled around a matched acquisition hour.
///
/// Returns `2 * half_days + 1` positions spaced `step` apart and centred on
/// `match_idx`. Every position `p` must have a successor `p + 1` on the axis
/// for interpolation.
pub fn coregistration_window(
    match_idx: usize,
    axis_len: usize,
    half_days: usize,
    step: usize,
) -> DebrisResult<Vec<usize>> {
    let reach = half_days * step;
    if match_idx < reach || match_idx + reach + 1 >= axis_len {
        return Err(DebrisError::WindowOutOfRange {
            match_idx,
            len: axis_len,
        });
    }

    let first = match_idx - reach;
    Ok((0..=2 * half_days).map(|k| first + k * step).collect())
}

/// Interpolate a cube along its time axis at each window position.
///
/// For position `p` the result is `v[p] + weight * (v[p + 1] - v[p])`,
/// applied independently to every (debris thickness, elevation band) pair.
pub fn interpolate_window(values: &DebrisCube, window: &[usize], weight: f64) -> DebrisResult<DebrisCube> {
    let (n_hd, n_time, n_elev) = values.dim();
    if let Some(&last) = window.last() {
        if last + 1 >= n_time {
            return Err(DebrisError::WindowOutOfRange {
                match_idx: last,
                len: n_time,
            });
        }
    }

    Ok(Array3::from_shape_fn((n_hd, window.len(), n_elev), |(h, i, e)| {
        let p = window[i];
        lerp(values[[h, p, e]], values[[h, p + 1, e]], weight)
    }))
}

/// Timestamps of interpolated samples: window times shifted by whole minutes
pub fn interpolated_times(
    time_axis: &[NaiveDateTime],
    window: &[usize],
    minute_offset: i64,
) -> Vec<NaiveDateTime> {
    let offset = Duration::minutes(minute_offset);
    window.iter().map(|&p| time_axis[p] + offset).collect()
}
