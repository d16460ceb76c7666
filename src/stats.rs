use chrono::{DateTime, Utc};
use serde::Serialize;

/// Samples at or above this many seconds are treated as outliers.
pub const DEFAULT_THRESHOLD: f64 = 30.0;
pub const DEFAULT_PRECISION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub variance: f64,
    pub stddev: f64,
}

/// Population statistics over the samples strictly below `threshold`.
///
/// Returns `None` when no sample survives the filter. Every figure is rounded
/// with [`round_to`].
pub fn summarize(samples: &[f64], threshold: f64, precision: u32) -> Option<IntervalStats> {
    let kept: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|value| *value < threshold)
        .collect();

    if kept.is_empty() {
        return None;
    }

    let count = kept.len() as f64;
    let mean = kept.iter().sum::<f64>() / count;
    let variance = kept.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / count;
    let min = kept.iter().copied().fold(f64::INFINITY, f64::min);
    let max = kept.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(IntervalStats {
        count: kept.len(),
        mean: round_to(mean, precision),
        min: round_to(min, precision),
        max: round_to(max, precision),
        variance: round_to(variance, precision),
        stddev: round_to(variance.sqrt(), precision),
    })
}

/// Rounds half away from zero at `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() / scale
}

/// Seconds between consecutive instants, after sorting them.
pub fn intervals_from_timestamps(timestamps: &[DateTime<Utc>]) -> Vec<f64> {
    let mut sorted = timestamps.to_vec();
    sorted.sort();
    sorted
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 1000.0)
        .collect()
}
