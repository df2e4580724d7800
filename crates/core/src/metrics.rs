//! Per-frame biomechanical features computed from 2D joint positions.
//!
//! Geometry helpers ([`angle`], [`torso_angle`]) are total: coincident or
//! degenerate points yield a finite value in `[0, 180]` degrees.
//! [`SideExtractor`] and [`FrontExtractor`] turn one frame's landmarks into
//! one [`FrameMetrics`] sample for their view.

use crate::types::{Channel, FrameSize, Joint, PoseLandmarks, Point2, View};

/// Added to vector-norm products so coincident points never divide by zero.
const ANGLE_EPSILON: f64 = 1e-8;

/// Added to stance and hip widths used as normalisers.
const WIDTH_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

fn angle_between(u: (f64, f64), v: (f64, f64)) -> f64 {
    let dot = u.0 * v.0 + u.1 * v.1;
    let norms = u.0.hypot(u.1) * v.0.hypot(v.1);
    let cos = (dot / (norms + ANGLE_EPSILON)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Interior angle at `b` formed by `a` and `c`, in degrees.
pub fn angle(a: Point2, b: Point2, c: Point2) -> f64 {
    angle_between((a.x - b.x, a.y - b.y), (c.x - b.x, c.y - b.y))
}

/// Forward lean of the hip→shoulder segment from upright, in degrees.
///
/// Image y grows downward, so "up" is `(0, -1)`. Returns 0 when the
/// shoulder is directly above the hip.
pub fn torso_angle(hip: Point2, shoulder: Point2) -> f64 {
    angle_between((shoulder.x - hip.x, shoulder.y - hip.y), (0.0, -1.0))
}

// ---------------------------------------------------------------------------
// FrameMetrics
// ---------------------------------------------------------------------------

/// Metrics for one frame with detected landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetrics {
    /// Hip height in pixels (larger = physically lower), used for rep
    /// segmentation.
    pub hip_height: f64,
    /// One value per channel of the view, in `View::channels()` order.
    pub values: Vec<(Channel, f64)>,
}

impl FrameMetrics {
    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, v)| *v)
    }
}

/// Converts landmarks into per-frame metrics for one view.
pub trait MetricExtractor {
    fn view(&self) -> View;

    /// Returns `None` when a joint this view needs is missing.
    fn extract(&mut self, landmarks: &PoseLandmarks, frame: FrameSize) -> Option<FrameMetrics>;
}

/// Create a fresh extractor for `view`. Extractors hold per-clip state, so
/// one must be created per clip.
pub fn extractor_for(view: View) -> Box<dyn MetricExtractor + Send> {
    match view {
        View::Side => Box::new(SideExtractor),
        View::Front => Box::new(FrontExtractor::default()),
    }
}

fn joint_px(landmarks: &PoseLandmarks, joint: Joint, frame: FrameSize) -> Option<Point2> {
    landmarks.get(joint).map(|p| p.to_pixels(frame))
}

// ---------------------------------------------------------------------------
// Side view
// ---------------------------------------------------------------------------

/// Sagittal-plane joint angles measured on the right side of the body.
#[derive(Debug, Default, Clone, Copy)]
pub struct SideExtractor;

impl MetricExtractor for SideExtractor {
    fn view(&self) -> View {
        View::Side
    }

    fn extract(&mut self, landmarks: &PoseLandmarks, frame: FrameSize) -> Option<FrameMetrics> {
        let hip = joint_px(landmarks, Joint::RightHip, frame)?;
        let knee = joint_px(landmarks, Joint::RightKnee, frame)?;
        let ankle = joint_px(landmarks, Joint::RightAnkle, frame)?;
        let shoulder = joint_px(landmarks, Joint::RightShoulder, frame)?;
        let toe = joint_px(landmarks, Joint::RightFootIndex, frame)?;

        Some(FrameMetrics {
            hip_height: hip.y,
            values: vec![
                (Channel::Hip, angle(shoulder, hip, knee)),
                (Channel::Knee, angle(hip, knee, ankle)),
                (Channel::Ankle, angle(knee, ankle, toe)),
                (Channel::Torso, torso_angle(hip, shoulder)),
            ],
        })
    }
}

// ---------------------------------------------------------------------------
// Front view
// ---------------------------------------------------------------------------

/// Frontal-plane indices.
///
/// Symmetry is reported relative to the first frame this extractor sees.
/// A single noisy first frame therefore offsets the whole channel; the
/// baseline is kept as the raw first sample, not re-estimated.
#[derive(Debug, Default, Clone)]
pub struct FrontExtractor {
    baseline_symmetry: Option<f64>,
}

impl FrontExtractor {
    pub fn baseline_symmetry(&self) -> Option<f64> {
        self.baseline_symmetry
    }
}

impl MetricExtractor for FrontExtractor {
    fn view(&self) -> View {
        View::Front
    }

    fn extract(&mut self, landmarks: &PoseLandmarks, frame: FrameSize) -> Option<FrameMetrics> {
        let lh = joint_px(landmarks, Joint::LeftHip, frame)?;
        let rh = joint_px(landmarks, Joint::RightHip, frame)?;
        let lk = joint_px(landmarks, Joint::LeftKnee, frame)?;
        let rk = joint_px(landmarks, Joint::RightKnee, frame)?;
        let la = joint_px(landmarks, Joint::LeftAnkle, frame)?;
        let ra = joint_px(landmarks, Joint::RightAnkle, frame)?;

        let hip_centre = lh.midpoint(rh);

        let stance_width = (la.x - ra.x).abs() + WIDTH_EPSILON;
        let left_valgus = (lk.x - la.x) / stance_width;
        let right_valgus = (rk.x - ra.x) / stance_width;
        let valgus = (left_valgus + right_valgus) / 2.0;

        let hip_width = (lh.x - rh.x).abs() + WIDTH_EPSILON;
        let raw_symmetry = (lk.x - rk.x) / hip_width;
        let baseline = *self.baseline_symmetry.get_or_insert(raw_symmetry);

        Some(FrameMetrics {
            hip_height: hip_centre.y,
            values: vec![
                (Channel::Valgus, valgus),
                (Channel::Symmetry, raw_symmetry - baseline),
                (Channel::Pelvic, (lh.y - rh.y) / frame.height),
                (Channel::Depth, hip_centre.y / frame.height),
            ],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    const UNIT_FRAME: FrameSize = FrameSize {
        width: 1.0,
        height: 1.0,
    };

    fn full_pose() -> PoseLandmarks {
        PoseLandmarks::new()
            .with(Joint::LeftShoulder, p(0.40, 0.20))
            .with(Joint::RightShoulder, p(0.60, 0.20))
            .with(Joint::LeftHip, p(0.42, 0.50))
            .with(Joint::RightHip, p(0.58, 0.50))
            .with(Joint::LeftKnee, p(0.40, 0.70))
            .with(Joint::RightKnee, p(0.60, 0.70))
            .with(Joint::LeftAnkle, p(0.38, 0.90))
            .with(Joint::RightAnkle, p(0.62, 0.90))
            .with(Joint::LeftFootIndex, p(0.35, 0.95))
            .with(Joint::RightFootIndex, p(0.65, 0.95))
    }

    // -- angle ----------------------------------------------------------------

    #[test]
    fn right_angle() {
        let a = angle(p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0));
        assert!((a - 90.0).abs() < 1e-2);
    }

    #[test]
    fn straight_line() {
        let a = angle(p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0));
        assert!((a - 180.0).abs() < 1e-2);
    }

    #[test]
    fn equilateral_triangle() {
        let a = angle(p(0.0, 0.0), p(1.0, 0.0), p(0.5, 3f64.sqrt() / 2.0));
        assert!((a - 60.0).abs() < 0.5);
    }

    #[test]
    fn coincident_points_are_finite() {
        let a = angle(p(1.0, 1.0), p(1.0, 1.0), p(2.0, 2.0));
        assert!(a.is_finite());
        assert!((0.0..=180.0).contains(&a));

        let all_same = angle(p(3.0, 3.0), p(3.0, 3.0), p(3.0, 3.0));
        assert!((0.0..=180.0).contains(&all_same));
    }

    // -- torso_angle ----------------------------------------------------------

    #[test]
    fn upright_torso_is_zero() {
        assert!(torso_angle(p(0.0, 100.0), p(0.0, 0.0)).abs() < 1e-2);
    }

    #[test]
    fn forward_lean_is_positive() {
        assert!(torso_angle(p(0.0, 100.0), p(20.0, 50.0)) > 0.0);
    }

    // -- extractors -----------------------------------------------------------

    #[test]
    fn side_extractor_emits_side_channels() {
        let m = SideExtractor.extract(&full_pose(), UNIT_FRAME).unwrap();
        let channels: Vec<Channel> = m.values.iter().map(|(c, _)| *c).collect();
        assert_eq!(channels, View::Side.channels());
        assert_eq!(m.hip_height, 0.50);
    }

    #[test]
    fn side_extractor_needs_foot_index() {
        let mut pose = full_pose();
        pose.remove(Joint::RightFootIndex);
        assert!(SideExtractor.extract(&pose, UNIT_FRAME).is_none());
    }

    #[test]
    fn front_symmetry_starts_at_zero_and_tracks_change() {
        let mut ex = FrontExtractor::default();
        let first = ex.extract(&full_pose(), UNIT_FRAME).unwrap();
        assert_eq!(first.get(Channel::Symmetry), Some(0.0));

        let shifted = full_pose().with(Joint::LeftKnee, p(0.44, 0.70));
        let second = ex.extract(&shifted, UNIT_FRAME).unwrap();
        assert!(second.get(Channel::Symmetry).unwrap() > 0.0);
        assert!(ex.baseline_symmetry().is_some());
    }

    #[test]
    fn front_indices_use_frame_height() {
        let frame = FrameSize {
            width: 640.0,
            height: 480.0,
        };
        let pose = full_pose().with(Joint::LeftHip, p(0.42, 0.55));
        let m = FrontExtractor::default().extract(&pose, frame).unwrap();
        assert!((m.get(Channel::Pelvic).unwrap() - 0.05).abs() < 1e-9);
        assert!((m.get(Channel::Depth).unwrap() - 0.525).abs() < 1e-9);
        assert!((m.hip_height - 0.525 * 480.0).abs() < 1e-9);
    }
}
