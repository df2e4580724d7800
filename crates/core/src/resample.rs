//! Linear resampling onto a fixed canonical length.

use crate::config::DEFAULT_CANONICAL_LENGTH;

/// Map `series` onto exactly `n` evenly spaced samples.
///
/// Both the input and output are laid over a normalised `[0, 1]` axis and
/// output samples are linearly interpolated. An empty input yields `n`
/// zeros; a single sample is repeated `n` times.
pub fn resample(series: &[f64], n: usize) -> Vec<f64> {
    match series.len() {
        0 => return vec![0.0; n],
        1 => return vec![series[0]; n],
        _ => {}
    }

    let last = (series.len() - 1) as f64;
    (0..n)
        .map(|i| {
            let t = if n > 1 {
                i as f64 / (n - 1) as f64
            } else {
                0.0
            };
            let pos = t * last;
            let idx = (pos.floor() as usize).min(series.len() - 1);
            let next = (idx + 1).min(series.len() - 1);
            let frac = pos - idx as f64;
            series[idx] + (series[next] - series[idx]) * frac
        })
        .collect()
}

/// [`resample`] onto [`DEFAULT_CANONICAL_LENGTH`] samples.
pub fn resample_default(series: &[f64]) -> Vec<f64> {
    resample(series, DEFAULT_CANONICAL_LENGTH)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
