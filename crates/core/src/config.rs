//! Tunable parameters for template building and aggregation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Samples per canonical trajectory (about 30 descending, 30 ascending).
pub const DEFAULT_CANONICAL_LENGTH: usize = 60;

/// Moving-average window applied to every recorded series.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Extra moving-average window the rep segmenter applies to hip height.
pub const DEFAULT_SEGMENT_SMOOTHING_WINDOW: usize = 7;

/// Minimum fraction of frames with a detected pose.
pub const DEFAULT_DETECTION_RATE_MIN: f64 = 0.6;

/// Minimum number of frames with a detected pose.
pub const DEFAULT_VALID_FRAMES_MIN: usize = 60;

/// Minimum `end - start` of a usable rep segment.
pub const DEFAULT_MIN_SEGMENT_LENGTH: usize = 20;

/// The bottom must lie strictly more than this many samples from either end.
pub const DEFAULT_EDGE_MARGIN: usize = 3;

/// Fraction of the furthest clips discarded during aggregation.
pub const DEFAULT_DROP_WORST_PCT: f64 = 0.2;

/// Below this many clips nothing is dropped as an outlier.
pub const MIN_CLIPS_FOR_OUTLIER_DROP: usize = 5;

// ---------------------------------------------------------------------------
// TemplateConfig
// ---------------------------------------------------------------------------

/// Parameters for the resampler, quality gate and aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub canonical_length: usize,
    pub smoothing_window: usize,
    pub segment_smoothing_window: usize,
    pub detection_rate_min: f64,
    pub valid_frames_min: usize,
    pub min_segment_length: usize,
    pub edge_margin: usize,
    pub drop_worst_pct: f64,
    /// Median centre with MAD spread when `true`, mean with standard
    /// deviation otherwise.
    pub use_median: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            canonical_length: DEFAULT_CANONICAL_LENGTH,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            segment_smoothing_window: DEFAULT_SEGMENT_SMOOTHING_WINDOW,
            detection_rate_min: DEFAULT_DETECTION_RATE_MIN,
            valid_frames_min: DEFAULT_VALID_FRAMES_MIN,
            min_segment_length: DEFAULT_MIN_SEGMENT_LENGTH,
            edge_margin: DEFAULT_EDGE_MARGIN,
            drop_worst_pct: DEFAULT_DROP_WORST_PCT,
            use_median: true,
        }
    }
}

impl TemplateConfig {
    /// Check every field is within its accepted range.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.canonical_length < 2 {
            return Err(CoreError::Validation(format!(
                "canonical_length must be >= 2, got {}",
                self.canonical_length
            )));
        }
        validate_window(self.smoothing_window, "smoothing_window")?;
        validate_window(self.segment_smoothing_window, "segment_smoothing_window")?;
        validate_unit_range(self.detection_rate_min, "detection_rate_min")?;
        if self.min_segment_length == 0 {
            return Err(CoreError::Validation(
                "min_segment_length must be >= 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.drop_worst_pct) {
            return Err(CoreError::Validation(format!(
                "drop_worst_pct must be in [0.0, 1.0), got {}",
                self.drop_worst_pct
            )));
        }
        Ok(())
    }
}

/// Validate that a value falls within `[0.0, 1.0]`.
pub fn validate_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

fn validate_window(k: usize, name: &str) -> Result<(), CoreError> {
    if k == 0 {
        return Err(CoreError::Validation(format!("{name} must be >= 1")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
