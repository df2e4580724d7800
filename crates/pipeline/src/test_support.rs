//! Synthetic squat clips shared by the unit tests.

use formref_core::types::{Joint, PoseLandmarks, Point2};

use crate::provider::{ClipMetadata, InMemoryClip, LandmarkFrame};

pub const META: ClipMetadata = ClipMetadata {
    fps: 30.0,
    width: 640,
    height: 480,
};

/// Standing pose with the hips lowered by `depth` (normalised units).
pub fn pose(depth: f64) -> PoseLandmarks {
    let p = Point2::new;
    PoseLandmarks::new()
        .with(Joint::LeftShoulder, p(0.42, 0.20 + depth))
        .with(Joint::RightShoulder, p(0.58, 0.20 + depth))
        .with(Joint::LeftHip, p(0.44, 0.50 + depth))
        .with(Joint::RightHip, p(0.56, 0.50 + depth))
        .with(Joint::LeftKnee, p(0.42 - depth, 0.70))
        .with(Joint::RightKnee, p(0.58 + depth, 0.70))
        .with(Joint::LeftAnkle, p(0.42, 0.90))
        .with(Joint::RightAnkle, p(0.58, 0.90))
        .with(Joint::LeftFootIndex, p(0.40, 0.95))
        .with(Joint::RightFootIndex, p(0.62, 0.95))
}

/// One smooth squat over `n` frames reaching `max_depth`.
pub fn squat_to(n: usize, max_depth: f64) -> Vec<LandmarkFrame> {
    (0..n)
        .map(|i| {
            let phase = i as f64 / (n - 1) as f64;
            let depth = max_depth * (1.0 - (2.0 * std::f64::consts::PI * phase).cos()) / 2.0;
            LandmarkFrame::Detected(pose(depth))
        })
        .collect()
}

pub fn squat(n: usize) -> Vec<LandmarkFrame> {
    squat_to(n, 0.1)
}

pub fn squat_clip(n: usize) -> InMemoryClip {
    InMemoryClip::new(META, squat(n))
}
