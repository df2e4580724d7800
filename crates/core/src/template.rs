//! Per-clip template records and the tagged per-clip outcome.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::quality_gate::QualityReport;
use crate::segmentation::RepSegment;
use crate::types::{Trajectories, View};

// ---------------------------------------------------------------------------
// ClipStage
// ---------------------------------------------------------------------------

/// Where a clip is in its processing lifecycle.
///
/// `Unprocessed -> Extracted -> Smoothed -> Segmented -> QualityPassed ->
/// Resampled -> Template`, with a terminal rejection possible after
/// segmentation (or at any stage on an unexpected failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipStage {
    Unprocessed,
    Extracted,
    Smoothed,
    Segmented,
    QualityPassed,
    Resampled,
    Template,
}

impl ClipStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Extracted => "extracted",
            Self::Smoothed => "smoothed",
            Self::Segmented => "segmented",
            Self::QualityPassed => "quality_passed",
            Self::Resampled => "resampled",
            Self::Template => "template",
        }
    }
}

impl std::fmt::Display for ClipStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RejectionReason
// ---------------------------------------------------------------------------

/// Why a clip was excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("no frames")]
    NoFrames,

    #[error("too few valid frames ({valid} < {min})")]
    TooFewValidFrames { valid: usize, min: usize },

    #[error("low detection rate ({rate:.3} < {min:.3})")]
    LowDetectionRate { rate: f64, min: f64 },

    #[error("segment too short ({length} < {min})")]
    SegmentTooShort { length: usize, min: usize },

    #[error(
        "bottom too close to edge (start={start}, bottom={bottom}, end={end}, margin={margin})"
    )]
    BottomTooCloseToEdge {
        start: usize,
        bottom: usize,
        end: usize,
        margin: usize,
    },

    #[error("processing failed during {stage}: {message}")]
    ProcessingFailed { stage: ClipStage, message: String },

    #[error("timed out after {millis}ms")]
    TimedOut { millis: u64 },
}

// ---------------------------------------------------------------------------
// PerClipTemplate
// ---------------------------------------------------------------------------

/// Canonical-length trajectories for one clip and view. Immutable once
/// built; consumed by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClipTemplate {
    pub file: String,
    pub view: View,
    pub fps: f64,
    pub rep_indices: RepSegment,
    pub quality: QualityReport,
    pub trajectories: Trajectories,
}

impl PerClipTemplate {
    /// Build a template, checking that `trajectories` carries exactly the
    /// view's channel set and that every series has the same length.
    pub fn new(
        file: impl Into<String>,
        view: View,
        fps: f64,
        rep_indices: RepSegment,
        quality: QualityReport,
        trajectories: Trajectories,
    ) -> Result<Self, CoreError> {
        let file = file.into();
        let channels: Vec<_> = trajectories.channels().collect();
        let mut expected = view.channels().to_vec();
        expected.sort();
        if channels != expected {
            return Err(CoreError::ContractViolation(format!(
                "template '{file}' for view {view} has channels {channels:?}, expected {expected:?}"
            )));
        }

        let ragged = {
            let mut lengths = trajectories.iter().map(|(_, s)| s.len());
            lengths.next().is_some_and(|first| lengths.any(|l| l != first))
        };
        if ragged {
            return Err(CoreError::ContractViolation(format!(
                "template '{file}' has trajectories of differing lengths"
            )));
        }

        Ok(Self {
            file,
            view,
            fps,
            rep_indices,
            quality,
            trajectories,
        })
    }

    /// Canonical length shared by every channel.
    pub fn n_samples(&self) -> usize {
        self.trajectories.iter().next().map_or(0, |(_, s)| s.len())
    }
}

// ---------------------------------------------------------------------------
// ClipOutcome
// ---------------------------------------------------------------------------

/// Result of processing one clip: either a usable template or a rejection
/// with its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClipOutcome {
    Template(PerClipTemplate),
    Rejected { file: String, reason: RejectionReason },
}

impl ClipOutcome {
    pub fn file(&self) -> &str {
        match self {
            Self::Template(t) => &t.file,
            Self::Rejected { file, .. } => file,
        }
    }

    pub fn template(&self) -> Option<&PerClipTemplate> {
        match self {
            Self::Template(t) => Some(t),
            Self::Rejected { .. } => None,
        }
    }

    pub fn into_template(self) -> Option<PerClipTemplate> {
        match self {
            Self::Template(t) => Some(t),
            Self::Rejected { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
