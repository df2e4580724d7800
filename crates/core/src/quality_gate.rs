//! Per-clip acceptance checks on detection coverage and segment shape.
//!
//! A rejection is a normal outcome carrying a [`RejectionReason`], never
//! an error. Checks run in a fixed order and the first failure wins.

use serde::{Deserialize, Serialize};

use crate::config::TemplateConfig;
use crate::segmentation::RepSegment;
use crate::template::RejectionReason;

// ---------------------------------------------------------------------------
// QualityReport
// ---------------------------------------------------------------------------

/// Frame counts for one clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_frames: usize,
    pub valid_frames: usize,
    /// `valid_frames / total_frames`, or 0 when no frames were read.
    pub detection_rate: f64,
}

impl QualityReport {
    pub fn new(total_frames: usize, valid_frames: usize) -> Self {
        let detection_rate = if total_frames == 0 {
            0.0
        } else {
            (valid_frames as f64 / total_frames as f64).clamp(0.0, 1.0)
        };
        Self {
            total_frames,
            valid_frames,
            detection_rate,
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Coverage checks: any frames at all, enough valid frames, and a high
/// enough detection rate.
pub fn check_coverage(
    report: &QualityReport,
    config: &TemplateConfig,
) -> Result<(), RejectionReason> {
    if report.total_frames == 0 {
        return Err(RejectionReason::NoFrames);
    }
    if report.valid_frames < config.valid_frames_min {
        return Err(RejectionReason::TooFewValidFrames {
            valid: report.valid_frames,
            min: config.valid_frames_min,
        });
    }
    if report.detection_rate < config.detection_rate_min {
        return Err(RejectionReason::LowDetectionRate {
            rate: report.detection_rate,
            min: config.detection_rate_min,
        });
    }
    Ok(())
}

/// Segment checks: long enough, with the bottom strictly more than
/// `edge_margin` samples from both ends.
pub fn check_segment(
    segment: &RepSegment,
    config: &TemplateConfig,
) -> Result<(), RejectionReason> {
    if segment.len() < config.min_segment_length {
        return Err(RejectionReason::SegmentTooShort {
            length: segment.len(),
            min: config.min_segment_length,
        });
    }
    let margin = config.edge_margin;
    if segment.bottom <= segment.start + margin || segment.bottom + margin >= segment.end {
        return Err(RejectionReason::BottomTooCloseToEdge {
            start: segment.start,
            bottom: segment.bottom,
            end: segment.end,
            margin,
        });
    }
    Ok(())
}

/// Run every check in order.
pub fn evaluate(
    report: &QualityReport,
    segment: &RepSegment,
    config: &TemplateConfig,
) -> Result<(), RejectionReason> {
    check_coverage(report, config)?;
    check_segment(segment, config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
