//! Per-clip template building: read → extract → smooth → gate → resample.

use std::path::Path;

use formref_core::config::TemplateConfig;
use formref_core::metrics::{extractor_for, FrameMetrics};
use formref_core::quality_gate::{self, QualityReport};
use formref_core::resample::resample;
use formref_core::segmentation::{detect_rep_from_hip_y, RepSegment};
use formref_core::smoothing::moving_average;
use formref_core::template::{ClipOutcome, ClipStage, PerClipTemplate, RejectionReason};
use formref_core::types::{Trajectories, View};

use crate::provider::{ClipReader, LandmarkFrame, LandmarkSource};

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

/// Append-only per-channel series accumulated while a clip is read.
#[derive(Debug, Clone, Default)]
pub struct ClipRecording {
    pub hip_height: Vec<f64>,
    pub channels: Trajectories,
    pub total_frames: usize,
    pub valid_frames: usize,
}

impl ClipRecording {
    pub fn new(view: View) -> Self {
        Self {
            channels: view.channels().iter().map(|c| (*c, Vec::new())).collect(),
            ..Default::default()
        }
    }

    fn push(&mut self, metrics: FrameMetrics) {
        self.valid_frames += 1;
        self.hip_height.push(metrics.hip_height);
        for (channel, value) in metrics.values {
            self.channels.push(channel, value);
        }
    }

    /// A new recording with every series smoothed by a `k`-tap moving
    /// average.
    pub fn smoothed(&self, k: usize) -> Self {
        Self {
            hip_height: moving_average(&self.hip_height, k),
            channels: self.channels.map_series(|s| moving_average(s, k)),
            total_frames: self.total_frames,
            valid_frames: self.valid_frames,
        }
    }

    pub fn quality(&self) -> QualityReport {
        QualityReport::new(self.total_frames, self.valid_frames)
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

pub(crate) fn failed(file: &str, stage: ClipStage, message: impl Into<String>) -> ClipOutcome {
    ClipOutcome::Rejected {
        file: file.to_string(),
        reason: RejectionReason::ProcessingFailed {
            stage,
            message: message.into(),
        },
    }
}

fn rejected(file: &str, view: View, reason: RejectionReason) -> ClipOutcome {
    tracing::warn!(file, view = %view, reason = %reason, "Clip rejected");
    ClipOutcome::Rejected {
        file: file.to_string(),
        reason,
    }
}

/// Read every frame of `reader` into a recording.
pub fn record_clip(
    reader: &mut dyn ClipReader,
    view: View,
) -> Result<ClipRecording, crate::PipelineError> {
    let frame_size = reader.metadata().frame_size();
    let mut extractor = extractor_for(view);
    let mut recording = ClipRecording::new(view);

    while let Some(frame) = reader.next_frame()? {
        recording.total_frames += 1;
        let LandmarkFrame::Detected(landmarks) = frame else {
            continue;
        };
        match extractor.extract(&landmarks, frame_size) {
            Some(metrics) => recording.push(metrics),
            None => tracing::debug!(
                frame = recording.total_frames - 1,
                view = %view,
                "Detected pose is missing joints for this view"
            ),
        }
    }
    Ok(recording)
}

/// Cut the inclusive segment from every channel and resample it to `n`.
pub fn cut_and_resample(channels: &Trajectories, segment: &RepSegment, n: usize) -> Trajectories {
    channels.map_series(|s| resample(segment.slice(s), n))
}

/// Build the template for one clip, or the reason it was rejected.
///
/// Never fails: read errors and contract violations become
/// [`RejectionReason::ProcessingFailed`] with the stage they occurred in.
pub fn build_clip_template(
    reader: &mut dyn ClipReader,
    file: &str,
    view: View,
    config: &TemplateConfig,
) -> ClipOutcome {
    let fps = reader.metadata().fps;

    let recording = match record_clip(reader, view) {
        Ok(r) => r,
        Err(e) => return failed(file, ClipStage::Unprocessed, e.to_string()),
    };
    tracing::debug!(
        file,
        view = %view,
        stage = %ClipStage::Extracted,
        total_frames = recording.total_frames,
        valid_frames = recording.valid_frames,
        "Landmarks extracted"
    );

    let smoothed = recording.smoothed(config.smoothing_window);
    let quality = smoothed.quality();
    if let Err(reason) = quality_gate::check_coverage(&quality, config) {
        return rejected(file, view, reason);
    }

    let Some(segment) = detect_rep_from_hip_y(&smoothed.hip_height, config.segment_smoothing_window)
    else {
        return rejected(
            file,
            view,
            RejectionReason::SegmentTooShort {
                length: 0,
                min: config.min_segment_length,
            },
        );
    };
    tracing::debug!(
        file,
        view = %view,
        stage = %ClipStage::Segmented,
        start = segment.start,
        bottom = segment.bottom,
        end = segment.end,
        "Rep segmented"
    );
    if let Err(reason) = quality_gate::check_segment(&segment, config) {
        return rejected(file, view, reason);
    }
    tracing::debug!(file, view = %view, stage = %ClipStage::QualityPassed, "Quality gate passed");

    let trajectories = cut_and_resample(&smoothed.channels, &segment, config.canonical_length);
    match PerClipTemplate::new(file, view, fps, segment, quality, trajectories) {
        Ok(template) => {
            tracing::debug!(
                file,
                view = %view,
                stage = %ClipStage::Template,
                "Clip template built"
            );
            ClipOutcome::Template(template)
        }
        Err(e) => failed(file, ClipStage::Resampled, e.to_string()),
    }
}

/// The name a clip is reported under: its file name, or the whole path
/// when it has none.
pub fn clip_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Open `path` through `source` and build its template.
pub fn process_clip_file(
    source: &dyn LandmarkSource,
    path: &Path,
    view: View,
    config: &TemplateConfig,
) -> ClipOutcome {
    let file = clip_file_name(path);

    let mut reader = match source.open(path) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(file = %file, view = %view, error = %e, "Could not open clip");
            return failed(&file, ClipStage::Unprocessed, e.to_string());
        }
    };
    build_clip_template(reader.as_mut(), &file, view, config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
