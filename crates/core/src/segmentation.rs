//! Single-repetition boundary detection from hip height.
//!
//! Assumes one dominant descent/ascent cycle per clip. This is not a
//! general multi-rep counter.

use serde::{Deserialize, Serialize};

use crate::smoothing::moving_average;

/// Frame indices of one repetition: standing start, deepest point, and
/// standing end. Always `start <= bottom <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepSegment {
    pub start: usize,
    pub bottom: usize,
    pub end: usize,
}

impl RepSegment {
    /// `end - start`, in samples.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Inclusive `[start, end]` slice of `series`, clamped to its length.
    pub fn slice<'a>(&self, series: &'a [f64]) -> &'a [f64] {
        if series.is_empty() {
            return series;
        }
        let end = self.end.min(series.len() - 1);
        let start = self.start.min(end);
        &series[start..=end]
    }
}

/// First index of the maximum value. NaN samples never win.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] || values[best].is_nan() {
            best = i;
        }
    }
    best
}

/// First index of the minimum value. NaN samples never win.
fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v < values[best] || values[best].is_nan() {
            best = i;
        }
    }
    best
}

/// Locate one repetition in a hip-height series (image y, so larger means
/// physically lower).
///
/// The series is smoothed again with `window`, then:
/// - `bottom` is the first global maximum,
/// - `start` is the lowest point at or before `bottom`,
/// - `end` is the lowest point at or after `bottom`.
///
/// When `end <= start` (e.g. a flat series) the whole clip is used.
/// Returns `None` for an empty series.
pub fn detect_rep_from_hip_y(hip_y: &[f64], window: usize) -> Option<RepSegment> {
    if hip_y.is_empty() {
        return None;
    }
    let y = moving_average(hip_y, window);

    let bottom = argmax(&y);
    let mut start = argmin(&y[..=bottom]);
    let mut end = bottom + argmin(&y[bottom..]);

    if end <= start {
        start = 0;
        end = y.len() - 1;
    }

    Some(RepSegment { start, bottom, end })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
