//! The landmark-provider seam.
//!
//! Video decoding and pose estimation happen upstream. A [`LandmarkSource`]
//! opens one clip and hands back a [`ClipReader`] that yields one
//! [`LandmarkFrame`] per video frame, in order.

use std::collections::VecDeque;
use std::path::Path;

use formref_core::types::{FrameSize, PoseLandmarks};

use crate::error::PipelineError;

/// Properties of the source video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipMetadata {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl ClipMetadata {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize {
            width: f64::from(self.width),
            height: f64::from(self.height),
        }
    }
}

/// Pose-estimation result for one video frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LandmarkFrame {
    Detected(PoseLandmarks),
    /// The frame was read but no pose was found. Counts toward the total
    /// frame count only.
    NoDetection,
}

/// Sequential, one-pass access to the frames of one clip.
pub trait ClipReader: Send {
    fn metadata(&self) -> ClipMetadata;

    /// Next frame, or `Ok(None)` once the clip is exhausted.
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, PipelineError>;
}

/// Opens clips found in a view directory.
pub trait LandmarkSource: Send + Sync {
    /// Whether `path` is a clip this source can open. Other files in a view
    /// directory are ignored.
    fn accepts(&self, path: &Path) -> bool;

    fn open(&self, path: &Path) -> Result<Box<dyn ClipReader>, PipelineError>;
}

// ---------------------------------------------------------------------------
// In-memory clip
// ---------------------------------------------------------------------------

/// A clip held entirely in memory, for callers that already have decoded
/// landmarks.
#[derive(Debug, Clone)]
pub struct InMemoryClip {
    metadata: ClipMetadata,
    frames: VecDeque<LandmarkFrame>,
}

impl InMemoryClip {
    pub fn new(metadata: ClipMetadata, frames: impl IntoIterator<Item = LandmarkFrame>) -> Self {
        Self {
            metadata,
            frames: frames.into_iter().collect(),
        }
    }
}

impl ClipReader for InMemoryClip {
    fn metadata(&self) -> ClipMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, PipelineError> {
        Ok(self.frames.pop_front())
    }
}
